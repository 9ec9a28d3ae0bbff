// `$variable` expansion for chart titles

use crate::error::{DashboardError, Result};
use std::collections::HashMap;
use std::iter::Peekable;
use std::str::Chars;

pub fn expand_variables(input: &str, variables: &HashMap<String, String>) -> Result<String> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '$' => {
                let var_name = consume_identifier(&mut chars);
                if var_name.is_empty() {
                    // Just a lone $, treat as literal
                    output.push('$');
                } else if let Some(val) = variables.get(&var_name) {
                    output.push_str(val);
                } else {
                    return Err(DashboardError::invalid_config(format!(
                        "title variable '${}' is not defined",
                        var_name
                    )));
                }
            }
            _ => output.push(c),
        }
    }

    Ok(output)
}

fn consume_identifier(chars: &mut Peekable<Chars>) -> String {
    let mut name = String::new();
    // Identifiers start with alpha or _
    if let Some(&c) = chars.peek() {
        if !c.is_alphabetic() && c != '_' {
            return name;
        }
    }

    while let Some(&c) = chars.peek() {
        if c.is_alphanumeric() || c == '_' {
            name.push(c);
            chars.next();
        } else {
            break;
        }
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expansion() {
        let mut vars = HashMap::new();
        vars.insert("product".to_string(), "사과".to_string());
        vars.insert("statistic".to_string(), "mean".to_string());

        let output = expand_variables("$statistic price of $product by region", &vars).unwrap();
        assert_eq!(output, "mean price of 사과 by region");
    }

    #[test]
    fn test_adjacent_punctuation() {
        let mut vars = HashMap::new();
        vars.insert("date".to_string(), "20251001".to_string());
        vars.insert("line".to_string(), "2호선".to_string());

        let output = expand_variables("$date / $line: top stations", &vars).unwrap();
        assert_eq!(output, "20251001 / 2호선: top stations");
    }

    #[test]
    fn test_lone_dollar() {
        let vars = HashMap::new();
        assert_eq!(expand_variables("Cost ($)", &vars).unwrap(), "Cost ($)");
        assert_eq!(expand_variables("$5 off", &vars).unwrap(), "$5 off");
    }

    #[test]
    fn test_undefined_variable() {
        let vars = HashMap::new();
        let result = expand_variables("Price of $missing", &vars);
        assert!(matches!(result, Err(DashboardError::InvalidConfig(_))));
    }
}
