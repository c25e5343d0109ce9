// Configuration - harness timeouts/browser settings and the environment lookup
//
// HarnessConfig follows the builder-ish options style of the Playwright bindings
// (LaunchOptions): plain struct, serde camelCase, chainable setters.
//
// Environment is the opaque key-value source fixtures read base URLs and
// credentials from. It is loaded once per suite from `.env.<name>` files
// layered under the process environment.

use crate::engine::LaunchRequest;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Default timeout in milliseconds for actions, navigation and fixture factories.
///
/// Matches Playwright's standard default across language implementations.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Default timeout for auto-retrying assertions (5 seconds, matching Playwright)
pub const DEFAULT_ASSERTION_TIMEOUT: Duration = Duration::from_secs(5);

/// Default polling interval for waits and assertions (100ms)
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Name of the environment used when `ENV` is not set.
pub const DEFAULT_ENVIRONMENT: &str = "test";

/// Browser engine to launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserKind {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl BrowserKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BrowserKind::Chromium => "chromium",
            BrowserKind::Firefox => "firefox",
            BrowserKind::Webkit => "webkit",
        }
    }
}

impl fmt::Display for BrowserKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Unknown names fall back to chromium
impl FromStr for BrowserKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "firefox" => BrowserKind::Firefox,
            "webkit" => BrowserKind::Webkit,
            _ => BrowserKind::Chromium,
        })
    }
}

/// Harness-wide settings.
///
/// Durations are serialized as milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HarnessConfig {
    /// Timeout for a single action precondition wait and for navigation
    #[serde(with = "duration_ms")]
    pub action_timeout: Duration,

    /// Interval between precondition checks
    #[serde(with = "duration_ms")]
    pub poll_interval: Duration,

    /// Timeout for auto-retrying element assertions
    #[serde(with = "duration_ms")]
    pub assertion_timeout: Duration,

    /// Time a fixture factory has to supply its instance
    #[serde(with = "duration_ms")]
    pub fixture_timeout: Duration,

    /// Time a fixture's teardown continuation has to finish
    #[serde(with = "duration_ms")]
    pub teardown_timeout: Duration,

    /// Optional limit for the whole test body
    #[serde(with = "option_duration_ms", skip_serializing_if = "Option::is_none")]
    pub test_timeout: Option<Duration>,

    /// Browser engine to launch
    pub browser: BrowserKind,

    /// Run in headless mode
    pub headless: bool,

    /// Slow down engine operations by N milliseconds
    pub slow_mo_ms: u64,

    /// Base URL page objects navigate relative to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            action_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            poll_interval: DEFAULT_POLL_INTERVAL,
            assertion_timeout: DEFAULT_ASSERTION_TIMEOUT,
            fixture_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            teardown_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            test_timeout: None,
            browser: BrowserKind::default(),
            headless: true,
            slow_mo_ms: 0,
            base_url: None,
        }
    }
}

impl HarnessConfig {
    /// Creates a new HarnessConfig with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the action/navigation timeout
    pub fn action_timeout(mut self, timeout: Duration) -> Self {
        self.action_timeout = timeout;
        self
    }

    /// Set the poll interval used by waits and assertions
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the auto-retrying assertion timeout
    pub fn assertion_timeout(mut self, timeout: Duration) -> Self {
        self.assertion_timeout = timeout;
        self
    }

    /// Set the fixture factory timeout
    pub fn fixture_timeout(mut self, timeout: Duration) -> Self {
        self.fixture_timeout = timeout;
        self
    }

    /// Set the fixture teardown timeout
    pub fn teardown_timeout(mut self, timeout: Duration) -> Self {
        self.teardown_timeout = timeout;
        self
    }

    /// Limit the duration of each test body
    pub fn test_timeout(mut self, timeout: Duration) -> Self {
        self.test_timeout = Some(timeout);
        self
    }

    /// Set the browser engine
    pub fn browser(mut self, browser: BrowserKind) -> Self {
        self.browser = browser;
        self
    }

    /// Run headless or headed
    pub fn headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Slow down engine operations
    pub fn slow_mo_ms(mut self, slow_mo_ms: u64) -> Self {
        self.slow_mo_ms = slow_mo_ms;
        self
    }

    /// Set the base URL for page objects
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Builds a config from `HARNESS_*` keys, falling back to defaults.
    ///
    /// Recognized keys: `HARNESS_ACTION_TIMEOUT_MS`, `HARNESS_POLL_INTERVAL_MS`,
    /// `HARNESS_ASSERTION_TIMEOUT_MS`, `HARNESS_FIXTURE_TIMEOUT_MS`,
    /// `HARNESS_TEARDOWN_TIMEOUT_MS`, `HARNESS_TEST_TIMEOUT_MS`, `HARNESS_BROWSER`,
    /// `HARNESS_HEADLESS`, `HARNESS_SLOW_MO_MS`, `BASE_URL`.
    pub fn from_environment(env: &Environment) -> Result<Self> {
        let mut config = Self::default();
        if let Some(ms) = env.parse::<u64>("HARNESS_ACTION_TIMEOUT_MS")? {
            config.action_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = env.parse::<u64>("HARNESS_POLL_INTERVAL_MS")? {
            config.poll_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = env.parse::<u64>("HARNESS_ASSERTION_TIMEOUT_MS")? {
            config.assertion_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = env.parse::<u64>("HARNESS_FIXTURE_TIMEOUT_MS")? {
            config.fixture_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = env.parse::<u64>("HARNESS_TEARDOWN_TIMEOUT_MS")? {
            config.teardown_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = env.parse::<u64>("HARNESS_TEST_TIMEOUT_MS")? {
            config.test_timeout = Some(Duration::from_millis(ms));
        }
        if let Some(browser) = env.parse::<BrowserKind>("HARNESS_BROWSER")? {
            config.browser = browser;
        }
        if let Some(headless) = env.parse::<bool>("HARNESS_HEADLESS")? {
            config.headless = headless;
        }
        if let Some(slow_mo) = env.parse::<u64>("HARNESS_SLOW_MO_MS")? {
            config.slow_mo_ms = slow_mo;
        }
        if let Some(base_url) = env.lookup("BASE_URL") {
            config.base_url = Some(base_url.to_string());
        }
        Ok(config)
    }

    /// Launch parameters derived from this config.
    pub fn launch_request(&self) -> LaunchRequest {
        LaunchRequest {
            browser: self.browser,
            headless: self.headless,
            slow_mo_ms: self.slow_mo_ms,
        }
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

mod option_duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
    }
}

/// Key-value configuration source (base URLs, credentials, environment id).
///
/// Values from the process environment take precedence over values read from
/// environment files, so CI can override a checked-in `.env.<name>` file.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    name: String,
    values: BTreeMap<String, String>,
}

impl Environment {
    /// Loads `<dir>/.env.<name>` layered under the process environment.
    ///
    /// `name` defaults to the `ENV` process variable, then [`DEFAULT_ENVIRONMENT`].
    /// A missing file is not an error: a warning is logged and only process
    /// variables are available. Process variables that are not valid UTF-8 are
    /// skipped with a warning.
    pub fn load(dir: impl AsRef<Path>, name: Option<&str>) -> Result<Self> {
        let name = name
            .map(str::to_string)
            .or_else(|| std::env::var("ENV").ok())
            .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string());
        let path = dir.as_ref().join(format!(".env.{}", name));

        let mut values = BTreeMap::new();
        if path.is_file() {
            let contents = std::fs::read_to_string(&path)?;
            values.extend(parse_env_file(&contents)?);
            tracing::info!(path = %path.display(), "Environment variables loaded");
        } else {
            tracing::warn!(path = %path.display(), "Environment file not found");
        }
        // Process variables win over file values
        values.extend(utf8_vars(std::env::vars_os()));

        Ok(Self { name, values })
    }

    /// Builds an environment from explicit pairs, without touching the process.
    pub fn from_pairs<I, K, V>(name: &str, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            name: name.to_string(),
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Environment identifier, e.g. "test" or "acceptance".
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Value for `key`, or `MissingConfig` when it is absent or empty.
    pub fn get(&self, key: &str) -> Result<&str> {
        self.lookup(key).ok_or_else(|| {
            tracing::error!(key, "Environment variable is not set");
            Error::MissingConfig(key.to_string())
        })
    }

    /// Value for `key`, or `fallback` (with a warning) when it is absent or empty.
    pub fn get_or<'a>(&'a self, key: &str, fallback: &'a str) -> &'a str {
        match self.lookup(key) {
            Some(value) => value,
            None => {
                tracing::warn!(key, fallback, "Environment variable is not set, using fallback");
                fallback
            }
        }
    }

    /// Fails on the first missing key.
    pub fn require(&self, keys: &[&str]) -> Result<()> {
        for key in keys {
            self.get(key)?;
        }
        Ok(())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.values.remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn lookup(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    fn parse<T: FromStr>(&self, key: &str) -> Result<Option<T>>
    where
        T::Err: fmt::Display,
    {
        self.lookup(key)
            .map(|raw| {
                raw.trim().parse::<T>().map_err(|e| {
                    Error::InvalidArgument(format!("{} has invalid value '{}': {}", key, raw, e))
                })
            })
            .transpose()
    }
}

/// Keeps the pairs that are valid UTF-8 on both sides.
fn utf8_vars<I>(vars: I) -> Vec<(String, String)>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    vars.into_iter()
        .filter_map(|(key, value)| {
            let name = key.to_string_lossy().into_owned();
            match (key.into_string(), value.into_string()) {
                (Ok(key), Ok(value)) => Some((key, value)),
                _ => {
                    tracing::warn!(
                        key = %name,
                        "Skipping process variable that is not valid UTF-8"
                    );
                    None
                }
            }
        })
        .collect()
}

/// Parses `KEY=VALUE` lines the way dotenv files are written.
///
/// Blank lines and `#` comment lines are skipped and an `export ` prefix is
/// accepted. Values are one line each:
/// - unquoted: trimmed; a `#` after whitespace starts a comment
/// - single-quoted: taken literally
/// - double-quoted: `\n`, `\r`, `\t`, `\"`, `\\` and `\$` escapes are expanded
///
/// Only a comment may follow the closing quote.
fn parse_env_file(contents: &str) -> Result<Vec<(String, String)>> {
    let mut pairs = Vec::new();
    for (index, line) in contents.lines().enumerate() {
        let number = index + 1;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        let (key, value) = line.split_once('=').ok_or_else(|| {
            Error::InvalidArgument(format!("line {}: expected KEY=VALUE", number))
        })?;
        pairs.push((key.trim().to_string(), parse_value(value, number)?));
    }
    Ok(pairs)
}

fn parse_value(raw: &str, line: usize) -> Result<String> {
    let raw = raw.trim();
    let Some(quote) = raw.chars().next().filter(|c| *c == '"' || *c == '\'') else {
        let end = raw
            .char_indices()
            .find(|(i, c)| *c == '#' && raw[..*i].ends_with(char::is_whitespace))
            .map_or(raw.len(), |(i, _)| i);
        return Ok(raw[..end].trim_end().to_string());
    };

    let body = &raw[1..];
    let mut value = String::new();
    let mut rest = None;
    let mut chars = body.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' if quote == '"' => match chars.next() {
                Some((_, 'n')) => value.push('\n'),
                Some((_, 'r')) => value.push('\r'),
                Some((_, 't')) => value.push('\t'),
                Some((_, escaped @ ('"' | '\\' | '$'))) => value.push(escaped),
                Some((_, other)) => {
                    value.push('\\');
                    value.push(other);
                }
                None => break,
            },
            c if c == quote => {
                rest = Some(&body[i + c.len_utf8()..]);
                break;
            }
            c => value.push(c),
        }
    }

    let rest = rest.ok_or_else(|| {
        Error::InvalidArgument(format!("line {}: unterminated {} quote", line, quote))
    })?;
    let rest = rest.trim_start();
    if !rest.is_empty() && !rest.starts_with('#') {
        return Err(Error::InvalidArgument(format!(
            "line {}: unexpected '{}' after closing quote",
            line, rest
        )));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = HarnessConfig::default();
        assert_eq!(config.action_timeout, Duration::from_millis(30_000));
        assert_eq!(config.poll_interval, Duration::from_millis(100));
        assert_eq!(config.assertion_timeout, Duration::from_secs(5));
        assert!(config.headless);
        assert_eq!(config.browser, BrowserKind::Chromium);
    }

    #[test]
    fn test_browser_kind_falls_back_to_chromium() {
        assert_eq!("Firefox".parse::<BrowserKind>().unwrap(), BrowserKind::Firefox);
        assert_eq!("webkit".parse::<BrowserKind>().unwrap(), BrowserKind::Webkit);
        assert_eq!("lynx".parse::<BrowserKind>().unwrap(), BrowserKind::Chromium);
    }

    #[test]
    fn test_config_serializes_durations_as_millis() {
        let config = HarnessConfig::new().action_timeout(Duration::from_secs(45));
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["actionTimeout"], 45_000);
        assert!(json.get("testTimeout").is_none());

        let back: HarnessConfig = serde_json::from_value(json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_config_from_environment() {
        let env = Environment::from_pairs(
            "ci",
            [
                ("HARNESS_ACTION_TIMEOUT_MS", "45000"),
                ("HARNESS_BROWSER", "firefox"),
                ("HARNESS_HEADLESS", "false"),
                ("BASE_URL", "https://example.test"),
            ],
        );
        let config = HarnessConfig::from_environment(&env).unwrap();
        assert_eq!(config.action_timeout, Duration::from_secs(45));
        assert_eq!(config.browser, BrowserKind::Firefox);
        assert!(!config.headless);
        assert_eq!(config.base_url.as_deref(), Some("https://example.test"));
    }

    #[test]
    fn test_config_rejects_bad_number() {
        let env = Environment::from_pairs("ci", [("HARNESS_SLOW_MO_MS", "soon")]);
        let err = HarnessConfig::from_environment(&env).unwrap_err();
        assert!(err.to_string().contains("HARNESS_SLOW_MO_MS"));
    }

    #[test]
    fn test_parse_env_file() {
        let pairs = parse_env_file(
            "# comment\n\nexport API_BASE_URL=https://api.test\nVALID_USERNAME=\"tomsmith\"\nEMPTY=\n",
        )
        .unwrap();
        assert_eq!(
            pairs,
            vec![
                ("API_BASE_URL".to_string(), "https://api.test".to_string()),
                ("VALID_USERNAME".to_string(), "tomsmith".to_string()),
                ("EMPTY".to_string(), String::new()),
            ]
        );
        assert!(parse_env_file("no equals sign").is_err());
    }

    #[test]
    fn test_parse_env_values_like_dotenv() {
        let pairs = parse_env_file(concat!(
            "BASE_URL=https://the-internet.herokuapp.com # staging host\n",
            "COLOR=#ff0000\n",
            "GREETING=\"say \\\"hi\\\"\\nthen leave\" # quoted\n",
            "LITERAL='no \\n escapes # here'\n",
            "PRICE=\"\\$5\"\n",
        ))
        .unwrap();
        let values: BTreeMap<_, _> = pairs.into_iter().collect();

        assert_eq!(values["BASE_URL"], "https://the-internet.herokuapp.com");
        assert_eq!(values["COLOR"], "#ff0000");
        assert_eq!(values["GREETING"], "say \"hi\"\nthen leave");
        assert_eq!(values["LITERAL"], "no \\n escapes # here");
        assert_eq!(values["PRICE"], "$5");
    }

    #[test]
    fn test_parse_env_rejects_broken_quotes() {
        let err = parse_env_file("A=1\nTOKEN=\"abc\n").unwrap_err();
        assert!(err.to_string().contains("line 2: unterminated \" quote"));

        let err = parse_env_file("TOKEN='abc' def\n").unwrap_err();
        assert!(err.to_string().contains("unexpected 'def' after closing quote"));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_process_variables_are_skipped() {
        use std::os::unix::ffi::OsStringExt;

        let vars = vec![
            (OsString::from("BASE_URL"), OsString::from("https://example.test")),
            (OsString::from("BROKEN"), OsString::from_vec(vec![0xff, 0xfe])),
            (OsString::from_vec(vec![b'K', 0xff]), OsString::from("value")),
        ];

        assert_eq!(
            utf8_vars(vars),
            vec![("BASE_URL".to_string(), "https://example.test".to_string())]
        );
    }

    #[test]
    fn test_empty_value_counts_as_missing() {
        let env = Environment::from_pairs("test", [("EMPTY", "")]);
        assert!(env.contains("EMPTY"));
        assert!(matches!(env.get("EMPTY"), Err(Error::MissingConfig(_))));
        assert_eq!(env.get_or("EMPTY", "fallback"), "fallback");
    }
}
