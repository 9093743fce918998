//! Configuration file reader.
//!
//! ```text
//! # global scope
//! sysguard on;
//! sysguard_load load=10 action=/overload;
//!
//! server {
//!     server_name api.example.com;
//!     sysguard_mem swapratio=50% action=@busy;
//! }
//! ```

use std::collections::BTreeSet;
use std::path::Path;

use super::{Action, ConfigError, DirectiveError, GuardConfig, ScopeDirectives};

/// A `server { ... }` block after merging with the global scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerScope {
    pub names: Vec<String>,
    pub config: GuardConfig,
}

impl ServerScope {
    fn matches(&self, host: &str) -> bool {
        self.names.iter().any(|n| n.eq_ignore_ascii_case(host))
    }
}

/// All scopes of a configuration file, merged and ready for lookups.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    global: GuardConfig,
    servers: Vec<ServerScope>,
}

impl Settings {
    /// Settings with only a global scope.
    pub fn single(config: GuardConfig) -> Self {
        Self {
            global: config,
            servers: Vec::new(),
        }
    }

    /// Reads and parses a configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Parses configuration text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let tokens = tokenize(content)?;
        let mut parser = Parser {
            tokens: tokens.into_iter(),
            line: 1,
        };

        let mut global = ScopeDirectives::default();
        let mut blocks: Vec<(Vec<String>, ScopeDirectives)> = Vec::new();

        while let Some(stmt) = parser.statement()? {
            match stmt.end {
                End::Semicolon => apply(&mut global, &stmt)?,
                End::Open if stmt.words == ["server"] => {
                    blocks.push(parser.server_block()?);
                }
                End::Open => {
                    return Err(ConfigError::Directive {
                        line: stmt.line,
                        name: stmt.words[0].clone(),
                        error: DirectiveError::NotAllowedHere,
                    });
                }
                End::Close => return Err(syntax(stmt.line, "unexpected \"}\"")),
            }
        }

        let servers = blocks
            .into_iter()
            .map(|(names, scope)| ServerScope {
                names,
                config: scope.merge(&global).finish(),
            })
            .collect();

        Ok(Self {
            global: global.finish(),
            servers,
        })
    }

    /// Configuration for a request addressed to `host`.
    ///
    /// The port, if any, is ignored. Hosts matching no `server_name` use the
    /// global scope.
    pub fn resolve(&self, host: Option<&str>) -> &GuardConfig {
        host.map(strip_port)
            .and_then(|h| self.servers.iter().find(|s| s.matches(h)))
            .map(|s| &s.config)
            .unwrap_or(&self.global)
    }

    pub fn global(&self) -> &GuardConfig {
        &self.global
    }

    pub fn servers(&self) -> &[ServerScope] {
        &self.servers
    }

    /// Every `@alias` referenced by any scope.
    pub fn named_actions(&self) -> BTreeSet<&str> {
        self.all_actions()
            .filter_map(|a| match a {
                Action::Named(alias) => Some(alias.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Every redirect path referenced by any scope.
    pub fn redirect_targets(&self) -> BTreeSet<&str> {
        self.all_actions()
            .filter_map(|a| match a {
                Action::Redirect(path) => Some(path.as_str()),
                _ => None,
            })
            .collect()
    }

    fn all_actions(&self) -> impl Iterator<Item = &Action> {
        std::iter::once(&self.global)
            .chain(self.servers.iter().map(|s| &s.config))
            .flat_map(|c| c.actions())
    }
}

fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        // [::1]:8080
        return host.split_once(']').map_or(host, |(h, _)| &h[1..]);
    }
    host.rsplit_once(':').map_or(host, |(h, _)| h)
}

fn apply(scope: &mut ScopeDirectives, stmt: &Statement) -> Result<(), ConfigError> {
    let name = &stmt.words[0];
    let result = if name == "server_name" {
        Err(DirectiveError::NotAllowedHere)
    } else {
        scope.apply(name, &stmt.words[1..])
    };
    result.map_err(|error| ConfigError::Directive {
        line: stmt.line,
        name: name.clone(),
        error,
    })
}

fn syntax(line: usize, message: impl Into<String>) -> ConfigError {
    ConfigError::Syntax {
        line,
        message: message.into(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Semicolon,
    Open,
    Close,
}

fn tokenize(content: &str) -> Result<Vec<(usize, Token)>, ConfigError> {
    let mut tokens = Vec::new();
    let mut chars = content.chars().peekable();
    let mut line = 1;

    while let Some(c) = chars.next() {
        match c {
            '\n' => line += 1,
            c if c.is_whitespace() => {}
            '#' => {
                while chars.next_if(|&c| c != '\n').is_some() {}
            }
            ';' => tokens.push((line, Token::Semicolon)),
            '{' => tokens.push((line, Token::Open)),
            '}' => tokens.push((line, Token::Close)),
            '"' => {
                let start = line;
                let mut word = String::new();
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(escaped) => word.push(escaped),
                            None => return Err(syntax(start, "unterminated quoted string")),
                        },
                        Some(c) => {
                            if c == '\n' {
                                line += 1;
                            }
                            word.push(c);
                        }
                        None => return Err(syntax(start, "unterminated quoted string")),
                    }
                }
                tokens.push((start, Token::Word(word)));
            }
            c => {
                let mut word = String::from(c);
                while let Some(c) =
                    chars.next_if(|&c| !c.is_whitespace() && !matches!(c, ';' | '{' | '}' | '#'))
                {
                    word.push(c);
                }
                tokens.push((line, Token::Word(word)));
            }
        }
    }

    Ok(tokens)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum End {
    Semicolon,
    Open,
    Close,
}

struct Statement {
    line: usize,
    words: Vec<String>,
    end: End,
}

struct Parser {
    tokens: std::vec::IntoIter<(usize, Token)>,
    /// Line of the last token consumed.
    line: usize,
}

impl Parser {
    /// Next statement, or `None` at end of input.
    ///
    /// A bare `}` comes back as a statement with no words.
    fn statement(&mut self) -> Result<Option<Statement>, ConfigError> {
        let mut words = Vec::new();
        let mut first_line = None;

        while let Some((line, token)) = self.tokens.next() {
            self.line = line;
            let start = *first_line.get_or_insert(line);
            let end = match token {
                Token::Word(w) => {
                    words.push(w);
                    continue;
                }
                Token::Semicolon => End::Semicolon,
                Token::Open => End::Open,
                Token::Close => End::Close,
            };

            if words.is_empty() && end != End::Close {
                let c = if end == End::Open { "{" } else { ";" };
                return Err(syntax(line, format!("unexpected \"{}\"", c)));
            }
            if !words.is_empty() && end == End::Close {
                return Err(syntax(line, "unexpected \"}\", expecting \";\""));
            }
            return Ok(Some(Statement {
                line: start,
                words,
                end,
            }));
        }

        match first_line {
            Some(line) => Err(syntax(line, "unexpected end of file, expecting \";\"")),
            None => Ok(None),
        }
    }

    fn server_block(&mut self) -> Result<(Vec<String>, ScopeDirectives), ConfigError> {
        let mut names = Vec::new();
        let mut scope = ScopeDirectives::default();

        loop {
            let Some(stmt) = self.statement()? else {
                return Err(syntax(self.line, "unexpected end of file, expecting \"}\""));
            };
            match stmt.end {
                End::Close => return Ok((names, scope)),
                End::Open => {
                    return Err(ConfigError::Directive {
                        line: stmt.line,
                        name: stmt.words[0].clone(),
                        error: DirectiveError::NotAllowedHere,
                    });
                }
                End::Semicolon if stmt.words[0] == "server_name" => {
                    if stmt.words.len() < 2 {
                        return Err(ConfigError::Directive {
                            line: stmt.line,
                            name: stmt.words[0].clone(),
                            error: DirectiveError::ArgumentCount,
                        });
                    }
                    names.extend(stmt.words[1..].iter().cloned());
                }
                End::Semicolon => apply(&mut scope, &stmt)?,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;
    use std::io::Write;
    use std::time::Duration;

    const SAMPLE: &str = r#"
# guard every server unless told otherwise
sysguard on;
sysguard_load load=10 action=/overload;
sysguard_interval 2s;

server {
    server_name api.example.com "www.example.com";
    sysguard_mem swapratio=50% action=@busy;
    sysguard_log_level warn;
}

server {
    server_name internal.example.com;
    sysguard off;
}
"#;

    #[test]
    fn test_parse_and_merge() {
        let settings = Settings::parse(SAMPLE).unwrap();

        let global = settings.global();
        assert!(global.enabled);
        assert_eq!(global.load_threshold().map(|t| t.raw()), Some(10000));
        assert_eq!(global.swap, None);
        assert_eq!(global.interval, Duration::from_secs(2));

        let api = settings.resolve(Some("api.example.com"));
        assert!(api.enabled);
        assert_eq!(api.load_threshold().map(|t| t.raw()), Some(10000));
        assert_eq!(api.swap_threshold().map(|t| t.raw()), Some(5000));
        assert_eq!(api.log_level, LogLevel::Warn);
        assert_eq!(api.interval, Duration::from_secs(2));

        assert!(!settings.resolve(Some("internal.example.com")).enabled);
    }

    #[test]
    fn test_resolve_host_variants() {
        let settings = Settings::parse(SAMPLE).unwrap();
        let api = &settings.servers()[0].config;

        assert_eq!(settings.resolve(Some("WWW.Example.com:8080")), api);
        assert_eq!(settings.resolve(Some("unknown.example.com")), settings.global());
        assert_eq!(settings.resolve(None), settings.global());
        assert_eq!(strip_port("[::1]:8080"), "::1");
        assert_eq!(strip_port("localhost"), "localhost");
    }

    #[test]
    fn test_named_actions() {
        let settings = Settings::parse(SAMPLE).unwrap();
        let aliases: Vec<&str> = settings.named_actions().into_iter().collect();
        assert_eq!(aliases, vec!["@busy"]);

        let paths: Vec<&str> = settings.redirect_targets().into_iter().collect();
        assert_eq!(paths, vec!["/overload"]);
    }

    #[test]
    fn test_empty_config_is_disabled() {
        let settings = Settings::parse("  # nothing here\n").unwrap();
        assert_eq!(settings.global(), &GuardConfig::default());
        assert!(settings.servers().is_empty());
    }

    #[test]
    fn test_directive_error_reports_line() {
        let err = Settings::parse("sysguard on;\nsysguard_load load=abc;\n").unwrap_err();
        match &err {
            ConfigError::Directive { line, error, .. } => {
                assert_eq!(*line, 2);
                assert_eq!(*error, DirectiveError::InvalidParameter("load=abc".into()));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.to_string(), "invalid parameter \"load=abc\" in line 2");
    }

    #[test]
    fn test_duplicate_in_same_scope() {
        let err = Settings::parse("sysguard_load load=1;\nsysguard_load load=2;\n").unwrap_err();
        assert_eq!(err.to_string(), "\"sysguard_load\" directive is duplicate in line 2");
    }

    #[test]
    fn test_same_directive_in_different_scopes_is_fine() {
        let settings =
            Settings::parse("sysguard_load load=1;\nserver { sysguard_load load=2; }\n").unwrap();
        assert_eq!(settings.global().load_threshold().map(|t| t.raw()), Some(1000));
        assert_eq!(
            settings.servers()[0].config.load_threshold().map(|t| t.raw()),
            Some(2000)
        );
    }

    #[test]
    fn test_syntax_errors() {
        for (text, line) in [
            ("sysguard on", 1),
            ("sysguard on;\n}\n", 2),
            ("server {\n sysguard on;\n", 2),
            ("sysguard \"on;\n", 1),
            ("\n;\n", 2),
        ] {
            match Settings::parse(text) {
                Err(ConfigError::Syntax { line: got, .. }) => assert_eq!(got, line, "{text:?}"),
                other => panic!("{text:?}: unexpected result {other:?}"),
            }
        }
    }

    #[test]
    fn test_scope_errors() {
        let err = Settings::parse("server_name a;\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Directive {
                error: DirectiveError::NotAllowedHere,
                ..
            }
        ));

        let err = Settings::parse("server {\n server {\n }\n}\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Directive {
                line: 2,
                error: DirectiveError::NotAllowedHere,
                ..
            }
        ));

        let err = Settings::parse("listen 80;\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Directive {
                error: DirectiveError::Unknown,
                ..
            }
        ));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let settings = Settings::from_file(file.path()).unwrap();
        assert_eq!(settings.servers().len(), 2);

        let err = Settings::from_file("/nonexistent/sysguard.conf").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
