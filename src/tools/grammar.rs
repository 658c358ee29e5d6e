//! Argument Grammar Analysis
//!
//! Walks a tool's argument words, rejects denied options, and collects every
//! host the tool would contact so each can be checked against the target
//! policy before anything runs.

use super::spec::{ArgGrammar, PositionalKind};

/// Error from analyzing argument words
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GrammarError {
    #[error("option '{0}' is not allowed")]
    DeniedOption(String),

    #[error("option '{0}' requires a value")]
    MissingValue(String),

    #[error("option '{0}' may not read from a local file")]
    FileValue(String),

    #[error("option '{0}' does not take a value")]
    InlineValue(String),
}

/// What the argument words contain
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArgAnalysis {
    /// Hosts, addresses or ranges the tool will contact
    pub targets: Vec<String>,

    /// Option names seen, as spelled by the caller
    pub options: Vec<String>,

    /// A raw-socket option is present
    pub privileged: bool,
}

impl ArgAnalysis {
    /// Whether any of `names` was supplied
    pub fn has_option(&self, names: &[&str]) -> bool {
        self.options.iter().any(|o| names.contains(&o.as_str()))
    }
}

impl ArgGrammar {
    /// Analyze argument words (tool name excluded)
    pub fn analyze(&self, words: &[String]) -> Result<ArgAnalysis, GrammarError> {
        let mut analysis = ArgAnalysis::default();
        let mut iter = words.iter();
        let mut end_of_options = false;
        let mut host_seen = false;

        while let Some(word) = iter.next() {
            if end_of_options || !is_option(word) {
                host_seen |= self.positional(word, host_seen, &mut analysis);
                continue;
            }
            if word == "--" {
                end_of_options = true;
                continue;
            }

            if let Some(body) = word.strip_prefix("--") {
                let (name, inline) = match body.split_once('=') {
                    Some((n, v)) => (format!("--{}", n), Some(v.to_string())),
                    None => (word.clone(), None),
                };
                self.check_long_denied(&name)?;
                if self.privileged_options.contains(&name.as_str()) {
                    analysis.privileged = true;
                }
                if self.takes_value(&name) {
                    let value = match inline {
                        Some(v) => v,
                        None => next_value(&mut iter, &name)?,
                    };
                    self.option_value(&name, &value, &mut analysis)?;
                } else if inline.is_some() {
                    return Err(GrammarError::InlineValue(name));
                }
                analysis.options.push(name);
                continue;
            }

            if let Some(denied) = self
                .denied_options
                .iter()
                .find(|d| !d.starts_with("--") && word.starts_with(*d))
            {
                return Err(GrammarError::DeniedOption(denied.to_string()));
            }

            if self.privileged_options.iter().any(|p| word.starts_with(p)) {
                analysis.privileged = true;
                analysis.options.push(word.clone());
                continue;
            }

            if self.takes_value(word) {
                let value = next_value(&mut iter, word)?;
                self.option_value(word, &value, &mut analysis)?;
                analysis.options.push(word.clone());
                continue;
            }

            if !self.getopt_short {
                analysis.options.push(word.clone());
                continue;
            }

            // Clustered short flags: -sSv, -c4, -xproxy:8080
            let body = &word[1..];
            for (idx, c) in body.char_indices() {
                let opt = format!("-{}", c);
                if self.denied_options.contains(&opt.as_str()) {
                    return Err(GrammarError::DeniedOption(opt));
                }
                if self.privileged_options.contains(&opt.as_str()) {
                    analysis.privileged = true;
                }
                if self.takes_value(&opt) {
                    let rest = &body[idx + c.len_utf8()..];
                    let value = if rest.is_empty() {
                        next_value(&mut iter, &opt)?
                    } else {
                        rest.to_string()
                    };
                    self.option_value(&opt, &value, &mut analysis)?;
                    analysis.options.push(opt);
                    break;
                }
                analysis.options.push(opt);
            }
        }

        Ok(analysis)
    }

    fn takes_value(&self, name: &str) -> bool {
        self.value_options.contains(&name)
            || self.target_options.contains(&name)
            || self.target_list_options.contains(&name)
    }

    fn is_known(&self, name: &str) -> bool {
        self.takes_value(name) || self.privileged_options.contains(&name)
    }

    /// Long options match exactly, or as an unambiguous abbreviation of a
    /// denied option when the name is not itself a known option.
    fn check_long_denied(&self, name: &str) -> Result<(), GrammarError> {
        let abbreviation = name.len() >= 5 && !self.is_known(name);
        let denied = self
            .denied_options
            .iter()
            .filter(|d| d.starts_with("--"))
            .find(|d| **d == name || (abbreviation && d.starts_with(name)));
        match denied {
            Some(d) => Err(GrammarError::DeniedOption(d.to_string())),
            None => Ok(()),
        }
    }

    fn option_value(
        &self,
        name: &str,
        value: &str,
        analysis: &mut ArgAnalysis,
    ) -> Result<(), GrammarError> {
        if self.reject_file_values && value.starts_with('@') {
            return Err(GrammarError::FileValue(name.to_string()));
        }
        if self.target_options.contains(&name) {
            analysis.targets.push(extract_host(value, PositionalKind::Url));
        }
        if self.target_list_options.contains(&name) {
            let hosts: Vec<String> = value
                .split(',')
                .map(str::trim)
                .filter(|h| !h.is_empty())
                .map(|h| extract_host(h, PositionalKind::Host))
                .collect();
            if hosts.is_empty() {
                return Err(GrammarError::MissingValue(name.to_string()));
            }
            analysis.targets.extend(hosts);
        }
        Ok(())
    }

    /// Record a positional word; returns true when it named a host
    fn positional(&self, word: &str, host_seen: bool, analysis: &mut ArgAnalysis) -> bool {
        if self.plus_options && word.starts_with('+') {
            return false;
        }
        if self.at_server {
            if let Some(server) = word.strip_prefix('@') {
                analysis.targets.push(extract_host(server, PositionalKind::Host));
                return false;
            }
        }
        if self
            .keywords
            .iter()
            .any(|k| k.eq_ignore_ascii_case(word))
        {
            return false;
        }
        if self.trailing_numbers && host_seen && is_port(word) {
            return false;
        }
        analysis.targets.push(extract_host(word, self.positional));
        true
    }
}

fn is_option(word: &str) -> bool {
    word.len() > 1 && word.starts_with('-')
}

fn next_value<'a, I>(iter: &mut I, name: &str) -> Result<String, GrammarError>
where
    I: Iterator<Item = &'a String>,
{
    iter.next()
        .cloned()
        .ok_or_else(|| GrammarError::MissingValue(name.to_string()))
}

/// A bare port number or size; larger numbers are left as targets since
/// resolvers read them as 32-bit addresses.
fn is_port(word: &str) -> bool {
    !word.is_empty()
        && word.len() <= 5
        && word.bytes().all(|b| b.is_ascii_digit())
        && word.parse::<u32>().is_ok_and(|n| n <= 65535)
}

/// Host part of a positional word or option value
///
/// `Url` strips scheme, credentials, port, path, query and fragment.
/// `Host` strips a trailing `:port` and IPv6 brackets but keeps CIDR suffixes.
pub fn extract_host(word: &str, kind: PositionalKind) -> String {
    match kind {
        PositionalKind::Url => {
            let rest = word.split_once("://").map_or(word, |(_, r)| r);
            let authority = rest
                .split(|c| matches!(c, '/' | '?' | '#'))
                .next()
                .unwrap_or("");
            let hostport = authority.rsplit_once('@').map_or(authority, |(_, h)| h);
            strip_port(hostport).to_string()
        }
        PositionalKind::Host => strip_port(word).to_string(),
    }
}

fn strip_port(hostport: &str) -> &str {
    if let Some(inner) = hostport.strip_prefix('[') {
        return inner.split(']').next().unwrap_or("");
    }
    match hostport.split_once(':') {
        Some((host, port))
            if !port.contains(':') && port.bytes().all(|b| b.is_ascii_digit()) =>
        {
            host
        }
        _ => hostport,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::catalog::builtin_tools;

    fn grammar(tool: &str) -> ArgGrammar {
        builtin_tools()
            .into_iter()
            .find(|t| t.name == tool)
            .unwrap()
            .grammar
    }

    fn analyze(tool: &str, words: &[&str]) -> Result<ArgAnalysis, GrammarError> {
        let words: Vec<String> = words.iter().map(|s| s.to_string()).collect();
        grammar(tool).analyze(&words)
    }

    #[test]
    fn test_dig_targets_skip_keywords_and_plus_options() {
        let a = analyze("dig", &["example.com", "MX", "+short", "@9.9.9.9"]).unwrap();
        assert_eq!(a.targets, vec!["example.com", "9.9.9.9"]);
    }

    #[test]
    fn test_dig_reverse_lookup_is_target() {
        let a = analyze("dig", &["-x", "192.0.2.1"]).unwrap();
        assert_eq!(a.targets, vec!["192.0.2.1"]);
    }

    #[test]
    fn test_nmap_privileged_scan_detected() {
        let a = analyze("nmap", &["-sS", "-p", "22,80", "scanme.nmap.org"]).unwrap();
        assert!(a.privileged);
        assert_eq!(a.targets, vec!["scanme.nmap.org"]);

        let a = analyze("nmap", &["-sT", "-Pn", "scanme.nmap.org"]).unwrap();
        assert!(!a.privileged);

        let a = analyze("nmap", &["-sSV", "scanme.nmap.org"]).unwrap();
        assert!(a.privileged);
    }

    #[test]
    fn test_nmap_denied_options() {
        assert_eq!(
            analyze("nmap", &["-iL", "/etc/hosts"]),
            Err(GrammarError::DeniedOption("-iL".to_string()))
        );
        assert_eq!(
            analyze("nmap", &["-oN/tmp/out", "example.com"]),
            Err(GrammarError::DeniedOption("-oN".to_string()))
        );
        assert_eq!(
            analyze("nmap", &["--resume=/tmp/x"]),
            Err(GrammarError::DeniedOption("--resume".to_string()))
        );
        assert_eq!(
            analyze("nmap", &["--datad", "/tmp"]),
            Err(GrammarError::DeniedOption("--datadir".to_string()))
        );
    }

    #[test]
    fn test_nmap_cidr_target() {
        let a = analyze("nmap", &["-p", "443", "198.51.100.0/24"]).unwrap();
        assert_eq!(a.targets, vec!["198.51.100.0/24"]);
    }

    #[test]
    fn test_curl_url_host_extracted() {
        let a = analyze(
            "curl",
            &["-sS", "-H", "Accept: */*", "https://user:pw@api.example.com:8443/v1?q=1"],
        )
        .unwrap();
        assert_eq!(a.targets, vec!["api.example.com"]);
    }

    #[test]
    fn test_curl_clustered_output_denied() {
        assert_eq!(
            analyze("curl", &["-sSo", "/tmp/x", "https://example.com"]),
            Err(GrammarError::DeniedOption("-o".to_string()))
        );
        assert_eq!(
            analyze("curl", &["--output", "/tmp/x", "https://example.com"]),
            Err(GrammarError::DeniedOption("--output".to_string()))
        );
        assert_eq!(
            analyze("curl", &["--resolve", "example.com:443:127.0.0.1", "https://example.com"]),
            Err(GrammarError::DeniedOption("--resolve".to_string()))
        );
    }

    #[test]
    fn test_curl_cookie_is_not_cookie_jar() {
        let a = analyze("curl", &["--cookie", "a=b", "https://example.com"]).unwrap();
        assert_eq!(a.targets, vec!["example.com"]);
    }

    #[test]
    fn test_curl_file_value_rejected() {
        assert_eq!(
            analyze("curl", &["-d", "@/etc/passwd", "https://example.com"]),
            Err(GrammarError::FileValue("-d".to_string()))
        );
    }

    #[test]
    fn test_curl_proxy_is_target() {
        let a = analyze("curl", &["-x", "http://10.0.0.1:3128", "https://example.com"]).unwrap();
        assert_eq!(a.targets, vec!["10.0.0.1", "example.com"]);

        let a = analyze("curl", &["--proxy=proxy.example:8080", "https://example.com"]).unwrap();
        assert_eq!(a.targets, vec!["proxy.example", "example.com"]);
    }

    #[test]
    fn test_nc_ports_skipped_exec_denied() {
        let a = analyze("nc", &["-zv", "-w", "3", "example.com", "80", "443"]).unwrap();
        assert_eq!(a.targets, vec!["example.com"]);

        assert_eq!(
            analyze("nc", &["-e", "/bin/sh", "example.com", "4444"]),
            Err(GrammarError::DeniedOption("-e".to_string()))
        );
        assert_eq!(
            analyze("nc", &["-lvp", "4444"]),
            Err(GrammarError::DeniedOption("-l".to_string()))
        );
    }

    #[test]
    fn test_ping_attached_count() {
        let a = analyze("ping", &["-c4", "example.com"]).unwrap();
        assert!(a.has_option(&["-c", "--count"]));
        assert_eq!(a.targets, vec!["example.com"]);
    }

    #[test]
    fn test_nc_leading_number_is_target() {
        let a = analyze("nc", &["-zv", "80", "example.com"]).unwrap();
        assert_eq!(a.targets, vec!["80", "example.com"]);
    }

    #[test]
    fn test_traceroute_packet_length_skipped() {
        let a = analyze("traceroute", &["-m", "20", "example.com", "60"]).unwrap();
        assert_eq!(a.targets, vec!["example.com"]);
    }

    #[test]
    fn test_small_numbers_are_targets_for_other_tools() {
        let a = analyze("curl", &["https://example.com", "0"]).unwrap();
        assert_eq!(a.targets, vec!["example.com", "0"]);

        let a = analyze("nmap", &["-sT", "scanme.nmap.org", "0"]).unwrap();
        assert_eq!(a.targets, vec!["scanme.nmap.org", "0"]);

        let a = analyze("ping", &["-c", "1", "80"]).unwrap();
        assert_eq!(a.targets, vec!["80"]);
    }

    #[test]
    fn test_nmap_dns_servers_are_targets() {
        let a = analyze("nmap", &["--dns-servers", "10.0.0.53,9.9.9.9", "example.com"]).unwrap();
        assert_eq!(a.targets, vec!["10.0.0.53", "9.9.9.9", "example.com"]);

        let a = analyze("nmap", &["--dns-servers=192.0.2.53", "example.com"]).unwrap();
        assert_eq!(a.targets, vec!["192.0.2.53", "example.com"]);

        assert_eq!(
            analyze("nmap", &["--dns-servers", ",", "example.com"]),
            Err(GrammarError::MissingValue("--dns-servers".to_string()))
        );
    }

    #[test]
    fn test_nmap_scripts_denied() {
        assert_eq!(
            analyze("nmap", &["--script", "broadcast-dhcp-discover"]),
            Err(GrammarError::DeniedOption("--script".to_string()))
        );
        assert_eq!(
            analyze("nmap", &["--script=http-title", "example.com"]),
            Err(GrammarError::DeniedOption("--script".to_string()))
        );
        assert_eq!(
            analyze("nmap", &["--script-args", "newtargets", "example.com"]),
            Err(GrammarError::DeniedOption("--script-args".to_string()))
        );
    }

    #[test]
    fn test_inline_value_on_flag_rejected() {
        assert_eq!(
            analyze("nmap", &["--foo=10.0.0.1", "example.com"]),
            Err(GrammarError::InlineValue("--foo".to_string()))
        );
        assert_eq!(
            analyze("curl", &["--insecure=10.0.0.1", "https://example.com"]),
            Err(GrammarError::InlineValue("--insecure".to_string()))
        );
    }

    #[test]
    fn test_large_number_is_target() {
        let a = analyze("ping", &["2130706433"]).unwrap();
        assert_eq!(a.targets, vec!["2130706433"]);
    }

    #[test]
    fn test_missing_value() {
        assert_eq!(
            analyze("whois", &["-h"]),
            Err(GrammarError::MissingValue("-h".to_string()))
        );
    }

    #[test]
    fn test_whois_server_is_target() {
        let a = analyze("whois", &["-h", "whois.example.net", "example.com"]).unwrap();
        assert_eq!(a.targets, vec!["whois.example.net", "example.com"]);
    }

    #[test]
    fn test_end_of_options_marker() {
        let a = analyze("host", &["--", "-example.com"]).unwrap();
        assert_eq!(a.targets, vec!["-example.com"]);
    }

    #[test]
    fn test_nikto_single_dash_long_options() {
        let a = analyze("nikto", &["-h", "https://web.example.com", "-Tuning", "x"]).unwrap();
        assert_eq!(a.targets, vec!["web.example.com"]);

        assert_eq!(
            analyze("nikto", &["-h", "web.example.com", "-output", "/tmp/r"]),
            Err(GrammarError::DeniedOption("-o".to_string()))
        );
    }

    #[test]
    fn test_extract_host() {
        assert_eq!(extract_host("example.com:22", PositionalKind::Host), "example.com");
        assert_eq!(extract_host("[2001:db8::1]:443", PositionalKind::Host), "2001:db8::1");
        assert_eq!(extract_host("2001:db8::1", PositionalKind::Host), "2001:db8::1");
        assert_eq!(extract_host("10.0.0.0/8", PositionalKind::Host), "10.0.0.0/8");
        assert_eq!(extract_host("example.com/path", PositionalKind::Url), "example.com");
        assert_eq!(extract_host("http://[::1]:8080/", PositionalKind::Url), "::1");
        assert_eq!(extract_host("file:///etc/passwd", PositionalKind::Url), "");
    }

    #[test]
    fn test_shell_metacharacters_stay_in_one_word() {
        let a = analyze("curl", &["-H", "X-Test: ; rm -rf / `id`", "https://example.com"]).unwrap();
        assert_eq!(a.targets, vec!["example.com"]);
    }
}
