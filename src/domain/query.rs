//! Query option vocabulary.
//!
//! Typed forms of the textual options accepted on the command line, in
//! TOML config files and in server requests.

use std::fmt;

/// Call graph construction algorithm offered by the builders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Algorithm {
    /// Statically resolvable calls only.
    Static,
    /// Class-hierarchy analysis: method calls fan out to every candidate.
    Cha,
    /// Rapid type analysis from program entry points.
    #[default]
    Rta,
    /// Pre-built graph documents produced by an external analyzer.
    Import,
}

impl Algorithm {
    pub fn parse(s: &str) -> Option<Algorithm> {
        match s.trim().to_lowercase().as_str() {
            "static" => Some(Algorithm::Static),
            "cha" => Some(Algorithm::Cha),
            "rta" => Some(Algorithm::Rta),
            "import" | "json" => Some(Algorithm::Import),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Algorithm::Static => "static",
            Algorithm::Cha => "cha",
            Algorithm::Rta => "rta",
            Algorithm::Import => "import",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Traversal direction from a start symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// Callees, transitively.
    #[default]
    Downstream,
    /// Callers, transitively.
    Upstream,
    Both,
}

impl Direction {
    pub fn parse(s: &str) -> Option<Direction> {
        match s.trim().to_lowercase().as_str() {
            "downstream" | "down" => Some(Direction::Downstream),
            "upstream" | "up" => Some(Direction::Upstream),
            "both" => Some(Direction::Both),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Direction::Downstream => "downstream",
            Direction::Upstream => "upstream",
            Direction::Both => "both",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// How rendered nodes are grouped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GroupMode {
    #[default]
    None,
    Module,
    Type,
    /// Module outer, receiver type inner.
    ModuleType,
}

impl GroupMode {
    /// Builds the mode from grouping keys such as `["pkg", "type"]`.
    /// Blank keys are ignored; unknown keys are rejected.
    pub fn from_keys<S: AsRef<str>>(keys: &[S]) -> Result<GroupMode, String> {
        let mut by_module = false;
        let mut by_type = false;
        for key in keys {
            match key.as_ref().trim().to_lowercase().as_str() {
                "" => {}
                "pkg" | "package" | "module" | "mod" => by_module = true,
                "type" => by_type = true,
                other => return Err(format!("invalid group option: {other}")),
            }
        }
        Ok(match (by_module, by_type) {
            (false, false) => GroupMode::None,
            (true, false) => GroupMode::Module,
            (false, true) => GroupMode::Type,
            (true, true) => GroupMode::ModuleType,
        })
    }

    pub fn keys(&self) -> Vec<&'static str> {
        match self {
            GroupMode::None => vec![],
            GroupMode::Module => vec!["pkg"],
            GroupMode::Type => vec!["type"],
            GroupMode::ModuleType => vec!["pkg", "type"],
        }
    }
}

/// Rendered output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Mermaid,
    Dot,
    Json,
}

impl OutputFormat {
    pub fn parse(s: &str) -> Option<OutputFormat> {
        match s.trim().to_lowercase().as_str() {
            "mermaid" | "mmd" => Some(OutputFormat::Mermaid),
            "dot" | "graphviz" => Some(OutputFormat::Dot),
            "json" => Some(OutputFormat::Json),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            OutputFormat::Mermaid => "mermaid",
            OutputFormat::Dot => "dot",
            OutputFormat::Json => "json",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Which endpoints must match the include-prefix and limit-keyword lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EndpointMatch {
    /// Caller and callee must both match (narrowing).
    #[default]
    Both,
    /// Either endpoint matching is enough.
    Either,
}

impl EndpointMatch {
    pub fn parse(s: &str) -> Option<EndpointMatch> {
        match s.trim().to_lowercase().as_str() {
            "both" | "and" => Some(EndpointMatch::Both),
            "either" | "or" => Some(EndpointMatch::Either),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            EndpointMatch::Both => "both",
            EndpointMatch::Either => "either",
        }
    }

    pub fn combine(&self, caller: bool, callee: bool) -> bool {
        match self {
            EndpointMatch::Both => caller && callee,
            EndpointMatch::Either => caller || callee,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_algorithm_parse() {
        assert_eq!(Algorithm::parse("static"), Some(Algorithm::Static));
        assert_eq!(Algorithm::parse("CHA"), Some(Algorithm::Cha));
        assert_eq!(Algorithm::parse(" rta "), Some(Algorithm::Rta));
        assert_eq!(Algorithm::parse("json"), Some(Algorithm::Import));
        assert_eq!(Algorithm::parse("vta"), None);
        assert_eq!(Algorithm::default(), Algorithm::Rta);
    }

    #[test]
    fn test_group_mode_from_keys() {
        assert_eq!(GroupMode::from_keys::<&str>(&[]), Ok(GroupMode::None));
        assert_eq!(GroupMode::from_keys(&["pkg"]), Ok(GroupMode::Module));
        assert_eq!(GroupMode::from_keys(&["type", " "]), Ok(GroupMode::Type));
        assert_eq!(GroupMode::from_keys(&["type", "pkg"]), Ok(GroupMode::ModuleType));
        assert!(GroupMode::from_keys(&["pkg", "file"]).is_err());
    }

    #[test]
    fn test_direction_parse() {
        assert_eq!(Direction::parse("upstream"), Some(Direction::Upstream));
        assert_eq!(Direction::parse("BOTH"), Some(Direction::Both));
        assert_eq!(Direction::parse("sideways"), None);
    }

    #[test]
    fn test_endpoint_match_combine() {
        assert!(!EndpointMatch::Both.combine(true, false));
        assert!(EndpointMatch::Either.combine(true, false));
        assert!(!EndpointMatch::Either.combine(false, false));
    }
}
