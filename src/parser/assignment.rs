// `key=value` arguments used for selections and column overrides

use super::lexer::{identifier, string_literal, ws};
use nom::{
    branch::alt,
    character::complete::char,
    combinator::{all_consuming, map, rest},
    sequence::separated_pair,
    IResult,
};

/// Parse `role=value`. The value is either a quoted string or the rest of
/// the input, trimmed.
pub fn parse_assignment(input: &str) -> IResult<&str, (String, String)> {
    all_consuming(separated_pair(
        ws(identifier),
        char('='),
        alt((
            ws(string_literal),
            map(rest, |s: &str| s.trim().to_string()),
        )),
    ))(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_value() {
        let (_, (key, value)) = parse_assignment("product=apple").unwrap();
        assert_eq!(key, "product");
        assert_eq!(value, "apple");
    }

    #[test]
    fn test_value_with_spaces_and_equals() {
        let (_, (key, value)) = parse_assignment(" region = 중구 1동 ").unwrap();
        assert_eq!(key, "region");
        assert_eq!(value, "중구 1동");

        let (_, (_, value)) = parse_assignment("expr=a=b").unwrap();
        assert_eq!(value, "a=b");
    }

    #[test]
    fn test_quoted_value() {
        let (_, (key, value)) = parse_assignment(r#"price="unit cost (krw)""#).unwrap();
        assert_eq!(key, "price");
        assert_eq!(value, "unit cost (krw)");
    }

    #[test]
    fn test_missing_key() {
        assert!(parse_assignment("=apple").is_err());
        assert!(parse_assignment("apple").is_err());
    }
}
