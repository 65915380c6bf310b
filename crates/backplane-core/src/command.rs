//! Command grammars and the validated [`CommandSpec`]
//!
//! Each backend kind accepts a small, fixed set of verbs:
//!
//! ```text
//! key_value   KEYS <pattern> | GET <key> | HGETALL <key> | SMEMBERS <key>
//!             | LRANGE <key> <start> <stop>
//! relational  SELECT ...
//! search      SEARCH <term...> [IN title|content|category|author]
//! vector      FILTER [category=<value>] [price=<min>..<max>] [limit=<1..=20>]
//! ```
//!
//! Parsing is the only place untrusted command text is validated. Anything
//! outside the grammar is rejected with [`BackendError::CommandRejected`]
//! naming the offending token; nothing is coerced to a default verb.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{BackendError, BackendResult};
use crate::models::BackendKind;

/// Largest `limit` a vector filter may request
pub const MAX_FILTER_LIMIT: u32 = 20;
/// `limit` used when a vector filter does not specify one
pub const DEFAULT_FILTER_LIMIT: u32 = 5;

/// Fields a search query may be restricted to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchField {
    Title,
    Content,
    Category,
    Author,
}

impl SearchField {
    pub const ALL: [SearchField; 4] = [
        SearchField::Title,
        SearchField::Content,
        SearchField::Category,
        SearchField::Author,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SearchField::Title => "title",
            SearchField::Content => "content",
            SearchField::Category => "category",
            SearchField::Author => "author",
        }
    }
}

impl fmt::Display for SearchField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SearchField::ALL
            .into_iter()
            .find(|field| field.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown search field: '{}'", s))
    }
}

/// Inclusive numeric range on the `price` payload field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRange {
    pub min: u64,
    pub max: u64,
}

/// A command accepted by one of the grammars
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Keys { pattern: String },
    Get { key: String },
    HGetAll { key: String },
    SMembers { key: String },
    LRange { key: String, start: i64, stop: i64 },
    Select { sql: String },
    Search { term: String, field: Option<SearchField> },
    Filter {
        category: Option<String>,
        price: Option<PriceRange>,
        limit: u32,
    },
}

/// A parsed, validated command bound to a backend.
///
/// The only constructor is [`CommandSpec::parse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    backend: String,
    kind: BackendKind,
    command: Command,
}

impl CommandSpec {
    /// Parse `raw` with the grammar of `kind`
    pub fn parse(backend: &str, kind: BackendKind, raw: &str) -> BackendResult<Self> {
        let tokens: Vec<&str> = raw.split_whitespace().collect();
        let (&verb_token, args) = tokens
            .split_first()
            .ok_or_else(|| BackendError::rejected("<empty>", "empty command"))?;
        let verb = verb_token.to_ascii_uppercase();

        let command = match kind {
            BackendKind::KeyValue => parse_key_value(verb_token, &verb, args)?,
            BackendKind::Relational => parse_relational(verb_token, &verb, raw)?,
            BackendKind::Search => parse_search(verb_token, &verb, args)?,
            BackendKind::Vector => parse_vector(verb_token, &verb, args)?,
        };

        Ok(Self {
            backend: backend.to_string(),
            kind,
            command,
        })
    }

    pub fn backend(&self) -> &str {
        &self.backend
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    pub fn command(&self) -> &Command {
        &self.command
    }

    /// Canonical (upper-case) verb
    pub fn verb(&self) -> &'static str {
        match self.command {
            Command::Keys { .. } => "KEYS",
            Command::Get { .. } => "GET",
            Command::HGetAll { .. } => "HGETALL",
            Command::SMembers { .. } => "SMEMBERS",
            Command::LRange { .. } => "LRANGE",
            Command::Select { .. } => "SELECT",
            Command::Search { .. } => "SEARCH",
            Command::Filter { .. } => "FILTER",
        }
    }

    /// Normalized arguments, in grammar order
    pub fn arguments(&self) -> Vec<String> {
        match &self.command {
            Command::Keys { pattern } => vec![pattern.clone()],
            Command::Get { key } | Command::HGetAll { key } | Command::SMembers { key } => {
                vec![key.clone()]
            }
            Command::LRange { key, start, stop } => {
                vec![key.clone(), start.to_string(), stop.to_string()]
            }
            Command::Select { sql } => vec![sql.clone()],
            Command::Search { term, field } => {
                let mut args = vec![term.clone()];
                if let Some(field) = field {
                    args.push(field.to_string());
                }
                args
            }
            Command::Filter {
                category,
                price,
                limit,
            } => {
                let mut args = Vec::new();
                if let Some(category) = category {
                    args.push(format!("category={}", category));
                }
                if let Some(price) = price {
                    args.push(format!("price={}..{}", price.min, price.max));
                }
                args.push(format!("limit={}", limit));
                args
            }
        }
    }

    /// Whether the backend returns this command's items in no defined order
    pub fn has_unordered_output(&self) -> bool {
        matches!(
            self.command,
            Command::Keys { .. } | Command::SMembers { .. }
        )
    }
}

fn not_allowed(token: &str, kind: BackendKind) -> BackendError {
    BackendError::rejected(
        token,
        format!(
            "verb not allowed for {} backend (allowed: {})",
            kind,
            kind.allowed_verbs().join(", ")
        ),
    )
}

/// Check the argument count of a fixed-arity verb
fn expect_args<'a>(
    verb_token: &str,
    args: &[&'a str],
    count: usize,
    usage: &str,
) -> BackendResult<Vec<&'a str>> {
    if args.len() < count {
        return Err(BackendError::rejected(
            verb_token,
            format!("missing argument (usage: {})", usage),
        ));
    }
    if let Some(extra) = args.get(count) {
        return Err(BackendError::rejected(
            *extra,
            format!("unexpected argument (usage: {})", usage),
        ));
    }
    Ok(args.to_vec())
}

fn parse_index(token: &str) -> BackendResult<i64> {
    token
        .parse()
        .map_err(|_| BackendError::rejected(token, "index must be an integer"))
}

fn parse_key_value(verb_token: &str, verb: &str, args: &[&str]) -> BackendResult<Command> {
    match verb {
        "KEYS" => {
            let args = expect_args(verb_token, args, 1, "KEYS <pattern>")?;
            Ok(Command::Keys {
                pattern: args[0].to_string(),
            })
        }
        "GET" => {
            let args = expect_args(verb_token, args, 1, "GET <key>")?;
            Ok(Command::Get {
                key: args[0].to_string(),
            })
        }
        "HGETALL" => {
            let args = expect_args(verb_token, args, 1, "HGETALL <key>")?;
            Ok(Command::HGetAll {
                key: args[0].to_string(),
            })
        }
        "SMEMBERS" => {
            let args = expect_args(verb_token, args, 1, "SMEMBERS <key>")?;
            Ok(Command::SMembers {
                key: args[0].to_string(),
            })
        }
        "LRANGE" => {
            let args = expect_args(verb_token, args, 3, "LRANGE <key> <start> <stop>")?;
            Ok(Command::LRange {
                key: args[0].to_string(),
                start: parse_index(args[1])?,
                stop: parse_index(args[2])?,
            })
        }
        _ => Err(not_allowed(verb_token, BackendKind::KeyValue)),
    }
}

fn parse_relational(verb_token: &str, verb: &str, raw: &str) -> BackendResult<Command> {
    if verb != "SELECT" {
        return Err(BackendError::rejected(
            verb_token,
            "only SELECT statements are allowed",
        ));
    }
    let sql = raw.trim().trim_end_matches(';').trim_end();
    Ok(Command::Select {
        sql: sql.to_string(),
    })
}

fn parse_search(verb_token: &str, verb: &str, args: &[&str]) -> BackendResult<Command> {
    if verb != "SEARCH" {
        return Err(not_allowed(verb_token, BackendKind::Search));
    }

    let (term_tokens, field) = match args {
        [rest @ .., keyword, field] if keyword.eq_ignore_ascii_case("IN") => {
            let field = field.parse::<SearchField>().map_err(|_| {
                BackendError::rejected(
                    *field,
                    "field must be one of title, content, category, author",
                )
            })?;
            (rest, Some(field))
        }
        _ => (args, None),
    };

    if term_tokens.is_empty() {
        return Err(BackendError::rejected(
            verb_token,
            "missing search term (usage: SEARCH <term...> [IN <field>])",
        ));
    }

    Ok(Command::Search {
        term: term_tokens.join(" "),
        field,
    })
}

fn parse_price_range(token: &str, value: &str) -> BackendResult<PriceRange> {
    let invalid = || BackendError::rejected(token, "price must look like <min>..<max>");
    let (min, max) = value.split_once("..").ok_or_else(invalid)?;
    let min: u64 = min.parse().map_err(|_| invalid())?;
    let max: u64 = max.parse().map_err(|_| invalid())?;
    if min > max {
        return Err(BackendError::rejected(
            token,
            "price minimum exceeds maximum",
        ));
    }
    Ok(PriceRange { min, max })
}

fn parse_vector(verb_token: &str, verb: &str, args: &[&str]) -> BackendResult<Command> {
    if verb != "FILTER" {
        return Err(not_allowed(verb_token, BackendKind::Vector));
    }

    let mut category = None;
    let mut price = None;
    let mut limit = None;

    for &token in args {
        let (key, value) = token
            .split_once('=')
            .filter(|(_, value)| !value.is_empty())
            .ok_or_else(|| BackendError::rejected(token, "expected <clause>=<value>"))?;

        let duplicate = || BackendError::rejected(token, "clause given more than once");
        match key.to_ascii_lowercase().as_str() {
            "category" => {
                if category.replace(value.to_string()).is_some() {
                    return Err(duplicate());
                }
            }
            "price" => {
                if price.replace(parse_price_range(token, value)?).is_some() {
                    return Err(duplicate());
                }
            }
            "limit" => {
                let n: u32 = value
                    .parse()
                    .ok()
                    .filter(|n| (1..=MAX_FILTER_LIMIT).contains(n))
                    .ok_or_else(|| {
                        BackendError::rejected(
                            token,
                            format!("limit must be between 1 and {}", MAX_FILTER_LIMIT),
                        )
                    })?;
                if limit.replace(n).is_some() {
                    return Err(duplicate());
                }
            }
            _ => {
                return Err(BackendError::rejected(
                    token,
                    "unknown clause (allowed: category, price, limit)",
                ))
            }
        }
    }

    Ok(Command::Filter {
        category,
        price,
        limit: limit.unwrap_or(DEFAULT_FILTER_LIMIT),
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn rejected_token(result: BackendResult<CommandSpec>) -> String {
        match result {
            Err(BackendError::CommandRejected { token, .. }) => token,
            other => panic!("expected CommandRejected, got {:?}", other),
        }
    }

    #[test]
    fn key_value_verbs_are_case_insensitive() {
        let spec = CommandSpec::parse("redis", BackendKind::KeyValue, "smembers categories:all")
            .unwrap();
        assert_eq!(spec.verb(), "SMEMBERS");
        assert_eq!(spec.arguments(), vec!["categories:all".to_string()]);
        assert!(spec.has_unordered_output());
    }

    #[test]
    fn lrange_parses_signed_indices() {
        let spec =
            CommandSpec::parse("redis", BackendKind::KeyValue, "LRANGE search:recent 0 -1").unwrap();
        assert_eq!(
            spec.command(),
            &Command::LRange {
                key: "search:recent".into(),
                start: 0,
                stop: -1
            }
        );
        assert!(!spec.has_unordered_output());
    }

    #[test]
    fn lrange_rejects_non_integer_index() {
        let token =
            rejected_token(CommandSpec::parse("redis", BackendKind::KeyValue, "LRANGE l 0 end"));
        assert_eq!(token, "end");
    }

    #[test]
    fn key_value_rejects_unknown_verb() {
        let token = rejected_token(CommandSpec::parse("redis", BackendKind::KeyValue, "FLUSHALL"));
        assert_eq!(token, "FLUSHALL");
    }

    #[test]
    fn key_value_rejects_missing_and_extra_arguments() {
        let missing = rejected_token(CommandSpec::parse("redis", BackendKind::KeyValue, "GET"));
        assert_eq!(missing, "GET");

        let extra = rejected_token(CommandSpec::parse("redis", BackendKind::KeyValue, "GET a b"));
        assert_eq!(extra, "b");

        let keys = rejected_token(CommandSpec::parse("redis", BackendKind::KeyValue, "KEYS"));
        assert_eq!(keys, "KEYS");
    }

    #[test]
    fn empty_command_is_rejected() {
        let token = rejected_token(CommandSpec::parse("redis", BackendKind::KeyValue, "   "));
        assert_eq!(token, "<empty>");
    }

    #[test]
    fn relational_accepts_only_select() {
        let spec = CommandSpec::parse(
            "postgres",
            BackendKind::Relational,
            "  select * from customers where city = '東京';  ",
        )
        .unwrap();
        assert_eq!(
            spec.arguments(),
            vec!["select * from customers where city = '東京'".to_string()]
        );

        let token = rejected_token(CommandSpec::parse(
            "postgres",
            BackendKind::Relational,
            "DELETE FROM customers",
        ));
        assert_eq!(token, "DELETE");
    }

    #[test]
    fn search_with_and_without_field() {
        let spec = CommandSpec::parse("es", BackendKind::Search, "SEARCH rust async IN title")
            .unwrap();
        assert_eq!(
            spec.command(),
            &Command::Search {
                term: "rust async".into(),
                field: Some(SearchField::Title)
            }
        );

        let spec = CommandSpec::parse("es", BackendKind::Search, "search Python").unwrap();
        assert_eq!(spec.arguments(), vec!["Python".to_string()]);
    }

    #[test]
    fn search_rejects_unknown_field_and_free_form_queries() {
        let token =
            rejected_token(CommandSpec::parse("es", BackendKind::Search, "SEARCH x IN tags"));
        assert_eq!(token, "tags");

        let token = rejected_token(CommandSpec::parse(
            "es",
            BackendKind::Search,
            r#"{"query":{"match_all":{}}}"#,
        ));
        assert_eq!(token, r#"{"query":{"match_all":{}}}"#);

        let token = rejected_token(CommandSpec::parse("es", BackendKind::Search, "SEARCH IN title"));
        assert_eq!(token, "SEARCH");
    }

    #[test]
    fn filter_defaults_limit() {
        let spec = CommandSpec::parse("qdrant", BackendKind::Vector, "FILTER").unwrap();
        assert_eq!(
            spec.command(),
            &Command::Filter {
                category: None,
                price: None,
                limit: DEFAULT_FILTER_LIMIT
            }
        );
    }

    #[test]
    fn filter_parses_all_clauses_in_any_order() {
        let spec = CommandSpec::parse(
            "qdrant",
            BackendKind::Vector,
            "FILTER limit=10 price=1000..50000 category=スポーツ",
        )
        .unwrap();
        assert_eq!(
            spec.arguments(),
            vec![
                "category=スポーツ".to_string(),
                "price=1000..50000".to_string(),
                "limit=10".to_string()
            ]
        );
    }

    #[test]
    fn filter_bounds_limit() {
        let token =
            rejected_token(CommandSpec::parse("qdrant", BackendKind::Vector, "FILTER limit=21"));
        assert_eq!(token, "limit=21");

        let token =
            rejected_token(CommandSpec::parse("qdrant", BackendKind::Vector, "FILTER limit=0"));
        assert_eq!(token, "limit=0");
    }

    #[test]
    fn filter_rejects_bad_clauses() {
        let cases = [
            ("FILTER price=10..5", "price=10..5"),
            ("FILTER price=cheap", "price=cheap"),
            ("FILTER color=red", "color=red"),
            ("FILTER category", "category"),
            ("FILTER category=a category=b", "category=b"),
            ("SEARCH shoes", "SEARCH"),
        ];
        for (raw, expected) in cases {
            let token = rejected_token(CommandSpec::parse("qdrant", BackendKind::Vector, raw));
            assert_eq!(token, expected, "command: {}", raw);
        }
    }
}
