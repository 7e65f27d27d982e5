/// Normalizes a phone number to E.164. Ten digit numbers are treated as North American.
pub fn normalize_phone_number(raw: &str) -> String {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    match digits.len() {
        10 => format!("+1{digits}"),
        _ => format!("+{digits}"),
    }
}

/// Only North American numbers are reachable through the sending short code.
pub fn is_phone_number_supported(phone_number: &str) -> bool {
    phone_number
        .strip_prefix("+1")
        .is_some_and(|rest| rest.len() == 10 && rest.chars().all(|c| c.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_common_formats() {
        assert_eq!(normalize_phone_number("(555) 555-0100"), "+15555550100");
        assert_eq!(normalize_phone_number("+1 555 555 0100"), "+15555550100");
        assert_eq!(normalize_phone_number("+44 20 7946 0958"), "+442079460958");
    }

    #[test]
    fn supports_only_north_american_numbers() {
        assert!(is_phone_number_supported("+15555550100"));
        assert!(!is_phone_number_supported("+442079460958"));
        assert!(!is_phone_number_supported("+1555555010"));
        assert!(!is_phone_number_supported("5555550100"));
    }
}
