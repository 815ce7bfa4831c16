//! Rule File Format
//!
//! Backup files hold one rule per line as `<Type>, <value>`:
//!
//! ```text
//! Domain, ads.example.com
//! URL, https://track.example.com/px
//! KeyWord, banner_ad
//! ```
//!
//! The type ends at the first comma; the value keeps any later commas. Lines
//! without a comma or with an unknown type are skipped.

use crate::rule::{Rule, RuleType};
use std::collections::BTreeSet;
use std::io::{self, BufRead, Write};
use tracing::{debug, info};

/// Parse one `<Type>, <value>` line
pub fn parse_rule_line(line: &str) -> Option<Rule> {
    let (type_part, value_part) = line.split_once(',')?;
    let rule_type = type_part.trim().parse::<RuleType>().ok()?;
    Some(Rule::new(rule_type, value_part.trim()))
}

/// Read every valid rule line
pub fn read_rules<R: BufRead>(reader: R) -> io::Result<Vec<Rule>> {
    let mut rules = Vec::new();
    let mut skipped = 0;
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match parse_rule_line(&line) {
            Some(rule) => rules.push(rule),
            None => {
                skipped += 1;
                debug!("Skipping malformed rule line: {}", line);
            }
        }
    }
    info!("Read {} rules from file ({} lines skipped)", rules.len(), skipped);
    Ok(rules)
}

/// Distinct, sorted export lines
pub fn export_lines(rules: &[Rule]) -> Vec<String> {
    rules
        .iter()
        .map(Rule::to_line)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Write rules in export form, returning the number of lines written
pub fn write_rules<W: Write>(mut writer: W, rules: &[Rule]) -> io::Result<usize> {
    let lines = export_lines(rules);
    for line in &lines {
        writeln!(writer, "{}", line)?;
    }
    writer.flush()?;
    Ok(lines.len())
}

/// Accepts `name.rule` and the `name.rule (2)` copies file pickers create
pub fn is_rule_file_name(name: &str) -> bool {
    let Some(pos) = name.rfind(".rule") else {
        return false;
    };
    let rest = name[pos + ".rule".len()..].trim_start();
    if rest.is_empty() {
        return true;
    }
    rest.strip_prefix('(')
        .and_then(|r| r.strip_suffix(')'))
        .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_parse_rule_line() {
        let rule = parse_rule_line("domain,  ads.example.com ").unwrap();
        assert_eq!(rule.rule_type, RuleType::Domain);
        assert_eq!(rule.value, "ads.example.com");

        assert!(parse_rule_line("URL").is_none());
        assert!(parse_rule_line("Regex, .*").is_none());

        let rule = parse_rule_line("URL, https://cdn.example.com/a,b").unwrap();
        assert_eq!(rule.rule_type, RuleType::Url);
        assert_eq!(rule.value, "https://cdn.example.com/a,b");
    }

    #[test]
    fn test_comma_values_survive_export() {
        let rules = vec![
            Rule::with_id(1, RuleType::Url, "https://cdn.example.com/a,b"),
            Rule::with_id(2, RuleType::KeyWord, "ad,banner"),
        ];
        let mut out = Vec::new();
        write_rules(&mut out, &rules).unwrap();

        let back = read_rules(Cursor::new(out)).unwrap();
        assert_eq!(back.len(), 2);
        assert!(back.iter().any(|r| r.same_entry(&rules[0])));
        assert!(back.iter().any(|r| r.same_entry(&rules[1])));
    }

    #[test]
    fn test_read_rules_skips_garbage() {
        let content = "Domain, a.com\n\nnot a rule\nURL, https://b.com/x\nKeyWord,ad_\n";
        let rules = read_rules(Cursor::new(content)).unwrap();
        assert_eq!(rules.len(), 3);
        assert_eq!(rules[2].value, "ad_");
    }

    #[test]
    fn test_export_is_distinct_and_sorted() {
        let rules = vec![
            Rule::with_id(1, RuleType::Url, "https://b/"),
            Rule::with_id(2, RuleType::Domain, "a.com"),
            Rule::with_id(3, RuleType::Domain, "a.com"),
        ];
        let mut out = Vec::new();
        assert_eq!(write_rules(&mut out, &rules).unwrap(), 2);
        assert_eq!(String::from_utf8(out).unwrap(), "Domain, a.com\nURL, https://b/\n");
    }

    #[test]
    fn test_rule_file_names() {
        assert!(is_rule_file_name("backup.rule"));
        assert!(is_rule_file_name("backup.rule (2)"));
        assert!(is_rule_file_name("backup.rule(12)"));
        assert!(!is_rule_file_name("backup.rules"));
        assert!(!is_rule_file_name("backup.txt"));
        assert!(!is_rule_file_name("backup.rule (x)"));
    }
}
