use crate::error::InvalidLabelReason;
use crate::isa;

/// Check a label or macro name against the identifier rules: 1 to
/// [`MAX_LABEL_LENGTH`](isa::MAX_LABEL_LENGTH) characters, letter first,
/// alphanumeric throughout, not a reserved word. Returns every rule the
/// name breaks, empty when valid.
pub(crate) fn validate_identifier(name: &str) -> Vec<InvalidLabelReason> {
    use InvalidLabelReason::*;

    let mut reasons = Vec::new();
    let length = name.chars().count();
    if length < 1 || length > isa::MAX_LABEL_LENGTH {
        reasons.push(Length { actual: length });
    }
    let first = name.chars().next();
    if !first.map(|c| c.is_ascii_alphabetic()).unwrap_or(false) {
        reasons.push(FirstChar { actual: first });
    }
    let bad: String = name
        .chars()
        .skip(1)
        .filter(|c| !c.is_ascii_alphanumeric())
        .collect();
    if !bad.is_empty() {
        reasons.push(OtherChars { actual: bad });
    }
    if isa::is_reserved_word(name) {
        reasons.push(Reserved);
    }
    reasons
}

/// The smallest two's-complement width that can represent `n`.
pub(crate) fn min_signed_width(n: i32) -> u8 {
    let mut width = 1;
    const BASE: i32 = 2;
    while n < -BASE.pow(width - 1) || n >= BASE.pow(width - 1) {
        width += 1;
    }
    width as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use InvalidLabelReason::*;

    #[test]
    fn identifier_rules() {
        assert!(validate_identifier("LOOP").is_empty());
        assert!(validate_identifier("a1b2").is_empty());
        assert!(matches!(validate_identifier("1st")[0], FirstChar { .. }));
        assert!(matches!(validate_identifier("A_B")[0], OtherChars { .. }));
        assert!(matches!(validate_identifier("mov")[0], Reserved));
        let long = "X".repeat(isa::MAX_LABEL_LENGTH + 1);
        assert!(matches!(validate_identifier(&long)[0], Length { .. }));
    }

    #[test]
    fn signed_width_boundaries() {
        assert_eq!(1, min_signed_width(0));
        assert_eq!(1, min_signed_width(-1));
        assert_eq!(2, min_signed_width(1));
        assert_eq!(12, min_signed_width(2047));
        assert_eq!(12, min_signed_width(-2048));
        assert_eq!(13, min_signed_width(2048));
        assert_eq!(13, min_signed_width(-2049));
    }
}
