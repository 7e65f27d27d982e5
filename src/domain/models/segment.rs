use std::ops::Add;

use serde::{Deserialize, Serialize};

use super::payload::RecipientPayload;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SegmentCounts {
    pub messages: u64,
    pub segments: u64,
}

impl Add for SegmentCounts {
    type Output = SegmentCounts;

    fn add(self, rhs: SegmentCounts) -> SegmentCounts {
        SegmentCounts {
            messages: self.messages + rhs.messages,
            segments: self.segments + rhs.segments,
        }
    }
}

/// Carrier constants: bodies up to `single_segment_limit` characters fit one segment,
/// longer ones are split into parts of `multipart_segment_size` because of the
/// concatenation headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentPolicy {
    pub single_segment_limit: usize,
    pub multipart_segment_size: usize,
}

impl Default for SegmentPolicy {
    fn default() -> Self {
        Self {
            single_segment_limit: 160,
            multipart_segment_size: 153,
        }
    }
}

impl SegmentPolicy {
    pub fn segments_for(&self, body: &str) -> u64 {
        let length = body.chars().count();
        if length == 0 {
            0
        } else if length <= self.single_segment_limit {
            1
        } else {
            length.div_ceil(self.multipart_segment_size.max(1)) as u64
        }
    }

    /// Only messages carrying a body reach the carrier, journey markers are free.
    pub fn count(&self, payloads: &[RecipientPayload]) -> SegmentCounts {
        payloads
            .iter()
            .flat_map(|payload| payload.messages.iter())
            .filter_map(|message| message.body.as_deref())
            .map(|body| SegmentCounts {
                messages: 1,
                segments: self.segments_for(body),
            })
            .fold(SegmentCounts::default(), Add::add)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{JourneyType, PayloadMessage};

    fn payload(phone_number: &str, bodies: &[Option<&str>]) -> RecipientPayload {
        RecipientPayload {
            phone_number: phone_number.to_string(),
            messages: bodies
                .iter()
                .map(|body| PayloadMessage {
                    body: body.map(str::to_string),
                    campaign_name: "campaign".to_string(),
                    journey_type: JourneyType::BulkSms,
                    media: None,
                })
                .collect(),
        }
    }

    #[test]
    fn segment_boundaries_follow_policy() {
        let policy = SegmentPolicy::default();
        assert_eq!(policy.segments_for(""), 0);
        assert_eq!(policy.segments_for(&"a".repeat(160)), 1);
        assert_eq!(policy.segments_for(&"a".repeat(161)), 2);
        assert_eq!(policy.segments_for(&"a".repeat(306)), 2);
        assert_eq!(policy.segments_for(&"a".repeat(307)), 3);
    }

    #[test]
    fn custom_policy_constants_are_honored() {
        let policy = SegmentPolicy {
            single_segment_limit: 70,
            multipart_segment_size: 67,
        };
        assert_eq!(policy.segments_for(&"é".repeat(70)), 1);
        assert_eq!(policy.segments_for(&"é".repeat(71)), 2);
    }

    #[test]
    fn markers_without_body_are_not_counted() {
        let policy = SegmentPolicy::default();
        let counts = policy.count(&[payload("+15555550100", &[None, Some("hello")])]);
        assert_eq!(counts, SegmentCounts { messages: 1, segments: 1 });
    }

    #[test]
    fn counting_is_additive_over_disjoint_lists() {
        let policy = SegmentPolicy::default();
        let long = "x".repeat(400);
        let a = vec![payload("+15555550100", &[Some("short")])];
        let b = vec![
            payload("+15555550101", &[None, Some(long.as_str())]),
            payload("+15555550102", &[Some("another")]),
        ];
        let joined: Vec<_> = a.iter().chain(b.iter()).cloned().collect();

        assert_eq!(policy.count(&joined), policy.count(&a) + policy.count(&b));
        assert_eq!(policy.count(&joined).segments, 1 + 3 + 1);
    }
}
