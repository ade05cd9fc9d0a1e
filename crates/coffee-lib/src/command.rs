//! The `/pred` directive
//!
//! `/pred <target> pais=<value> tipo=<value> año=<yyyy>`, where target is
//! one of `precio`, `consumo`, `utilidad`. Anything that does not match the
//! whole grammar is free text.

use crate::aligner::QueryKey;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

static COMMAND_RE: OnceLock<Regex> = OnceLock::new();

fn command_re() -> &'static Regex {
    COMMAND_RE.get_or_init(|| {
        Regex::new(
            r#"(?ix)
            ^/pred\s+(?P<target>precio|consumo|utilidad)\s+
            pa[ií]s=(?P<country>"[^"]+"|[^\ ]+)\s+
            tipo=(?P<ctype>"[^"]+"|[^\ ]+)\s+
            a(?:ñ|n|ni)o=(?P<year>[0-9]{4})$"#,
        )
        .expect("command pattern is valid")
    })
}

/// Measurement a command asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    Precio,
    Consumo,
    Utilidad,
}

impl Target {
    pub const ALL: [Target; 3] = [Target::Precio, Target::Consumo, Target::Utilidad];

    /// Keyword used in commands
    pub fn keyword(&self) -> &'static str {
        match self {
            Target::Precio => "precio",
            Target::Consumo => "consumo",
            Target::Utilidad => "utilidad",
        }
    }

    /// Column predicted in the historical table
    pub fn column(&self) -> &'static str {
        match self {
            Target::Precio => "price",
            Target::Consumo => "consumption",
            Target::Utilidad => "profit",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Target::Precio => "Precio",
            Target::Consumo => "Consumo",
            Target::Utilidad => "Utilidad",
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

impl FromStr for Target {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        Target::ALL
            .into_iter()
            .find(|t| t.keyword() == lower || t.column() == lower)
            .ok_or_else(|| format!("unknown target '{}' (expected precio, consumo or utilidad)", s))
    }
}

/// A recognized prediction request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredictCommand {
    pub target: Target,
    pub country: String,
    pub coffee_type: String,
    pub year: i32,
}

impl PredictCommand {
    pub fn key(&self) -> QueryKey {
        QueryKey::new(self.country.clone(), self.coffee_type.clone(), self.year)
    }
}

/// Parse a `/pred` directive; `None` means the input is free text
pub fn parse_command(input: &str) -> Option<PredictCommand> {
    let caps = command_re().captures(input.trim())?;
    Some(PredictCommand {
        target: caps["target"].parse().ok()?,
        country: strip_quotes(&caps["country"]).to_string(),
        coffee_type: strip_quotes(&caps["ctype"]).to_string(),
        year: caps["year"].parse().ok()?,
    })
}

/// Remove one pair of matching single or double quotes
pub fn strip_quotes(s: &str) -> &str {
    for quote in ['"', '\''] {
        if s.len() >= 2 && s.starts_with(quote) && s.ends_with(quote) {
            return &s[1..s.len() - 1];
        }
    }
    s
}
