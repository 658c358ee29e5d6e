//! Built-in Tool Catalog

use super::capabilities::Capability;
use super::spec::{ArgGrammar, PositionalKind, ToolCategory, ToolSpec};
use super::timeout::TimeoutBounds;

/// Fixed options for non-interactive, stateless SSH sessions
pub const SSH_EPHEMERAL_OPTIONS: &[&str] = &[
    "-o",
    "BatchMode=yes",
    "-o",
    "UserKnownHostsFile=/dev/null",
    "-o",
    "StrictHostKeyChecking=no",
    "-o",
    "CheckHostIP=no",
    "-o",
    "LogLevel=ERROR",
];

const DNS_RECORD_KEYWORDS: &[&str] = &[
    "a", "aaaa", "any", "axfr", "caa", "cname", "dnskey", "ds", "hinfo", "ixfr", "mx", "naptr",
    "ns", "nsec", "ptr", "rrsig", "soa", "spf", "srv", "tlsa", "txt", "in", "ch", "hs",
];

const NMAP: ArgGrammar = ArgGrammar {
    value_options: &[
        "-p",
        "-T",
        "-e",
        "--exclude",
        "--top-ports",
        "--max-retries",
        "--host-timeout",
        "--min-rate",
        "--max-rate",
        "--version-intensity",
        "--min-parallelism",
        "--max-parallelism",
        "--scan-delay",
        "--max-scan-delay",
        "--source-port",
        "-g",
        "--ttl",
        "--data-length",
    ],
    target_options: &[],
    target_list_options: &["--dns-servers"],
    denied_options: &[
        "-iL",
        "-iR",
        "-oN",
        "-oX",
        "-oS",
        "-oG",
        "-oA",
        "-D",
        "-S",
        "-b",
        "--resume",
        "--datadir",
        "--servicedb",
        "--versiondb",
        "--stylesheet",
        "--excludefile",
        "--script-args-file",
        "--proxies",
        "--spoof-mac",
        "--append-output",
        "--script",
        "--script-args",
    ],
    privileged_options: &[
        "-sS", "-sA", "-sW", "-sM", "-sU", "-sN", "-sF", "-sX", "-sY", "-sZ", "-sO", "-sI", "-O",
    ],
    keywords: &[],
    positional: PositionalKind::Host,
    trailing_numbers: false,
    getopt_short: false,
    plus_options: false,
    at_server: false,
    reject_file_values: false,
};

const DIG: ArgGrammar = ArgGrammar {
    value_options: &["-t", "-c", "-p", "-q", "-b"],
    target_options: &["-x"],
    denied_options: &["-f", "-k", "-y"],
    keywords: DNS_RECORD_KEYWORDS,
    plus_options: true,
    at_server: true,
    ..ArgGrammar::plain(PositionalKind::Host)
};

const HOST: ArgGrammar = ArgGrammar {
    value_options: &["-t", "-c", "-N", "-R", "-W", "-m"],
    ..ArgGrammar::plain(PositionalKind::Host)
};

const WHOIS: ArgGrammar = ArgGrammar {
    value_options: &["-p", "-T", "-i", "-s", "-g", "-q", "-t", "-v"],
    target_options: &["-h", "--host"],
    ..ArgGrammar::plain(PositionalKind::Host)
};

const CURL: ArgGrammar = ArgGrammar {
    value_options: &[
        "-H",
        "--header",
        "-A",
        "--user-agent",
        "-X",
        "--request",
        "-d",
        "--data",
        "--data-raw",
        "--data-binary",
        "--data-urlencode",
        "-e",
        "--referer",
        "-u",
        "--user",
        "-m",
        "--max-time",
        "--connect-timeout",
        "-w",
        "--write-out",
        "-b",
        "--cookie",
        "--max-redirs",
        "--retry",
        "--tls-max",
        "--ciphers",
        "-r",
        "--range",
        "-F",
        "--form",
    ],
    target_options: &["-x", "--proxy", "--preproxy"],
    denied_options: &[
        "-o",
        "--output",
        "--output-dir",
        "-O",
        "--remote-name",
        "--remote-name-all",
        "-J",
        "--remote-header-name",
        "-K",
        "--config",
        "-T",
        "--upload-file",
        "-c",
        "--cookie-jar",
        "-D",
        "--dump-header",
        "--trace",
        "--trace-ascii",
        "--stderr",
        "--libcurl",
        "--resolve",
        "--connect-to",
        "--unix-socket",
        "--abstract-unix-socket",
        "--interface",
        "--dns-servers",
        "--doh-url",
        "--cacert",
        "--capath",
        "--cert",
        "--key",
        "--netrc-file",
        "-n",
        "--netrc",
        "--hsts",
        "--alt-svc",
        "--etag-save",
        "--etag-compare",
        "-q",
        "--disable",
        "--engine",
    ],
    reject_file_values: true,
    ..ArgGrammar::plain(PositionalKind::Url)
};

const TRACEROUTE: ArgGrammar = ArgGrammar {
    value_options: &["-m", "-q", "-w", "-p", "-f", "-t", "-z", "-N", "-M", "-O"],
    target_options: &["-g"],
    denied_options: &["-i", "-s"],
    trailing_numbers: true,
    ..ArgGrammar::plain(PositionalKind::Host)
};

const MTR: ArgGrammar = ArgGrammar {
    value_options: &[
        "-c",
        "--report-cycles",
        "-i",
        "--interval",
        "-s",
        "--psize",
        "-m",
        "--max-ttl",
        "-f",
        "--first-ttl",
        "-P",
        "--port",
        "-Q",
        "--tos",
        "-G",
        "--gracetime",
        "-Z",
        "--timeout",
    ],
    denied_options: &[
        "-F",
        "--filename",
        "-a",
        "--address",
        "-I",
        "--interface",
    ],
    ..ArgGrammar::plain(PositionalKind::Host)
};

const NC: ArgGrammar = ArgGrammar {
    value_options: &["-w", "-i", "-p", "-q", "-W", "-T", "-X"],
    target_options: &["-x", "--proxy"],
    denied_options: &[
        "-e",
        "--exec",
        "-c",
        "--sh-exec",
        "--lua-exec",
        "-l",
        "--listen",
        "-k",
        "--keep-open",
        "-o",
        "--output",
        "-O",
        "--hex-dump",
        "-s",
        "--source",
        "-U",
        "--unixsock",
        "-L",
        "--broker",
        "--chat",
    ],
    trailing_numbers: true,
    ..ArgGrammar::plain(PositionalKind::Host)
};

const SSLSCAN: ArgGrammar = ArgGrammar {
    value_options: &["--sni-name", "--timeout", "--connect-timeout", "--sleep"],
    denied_options: &[
        "--targets",
        "--xml",
        "--certs",
        "--pk",
        "--pkpass",
        "--sni-file",
    ],
    getopt_short: false,
    ..ArgGrammar::plain(PositionalKind::Host)
};

const TESTSSL: ArgGrammar = ArgGrammar {
    value_options: &[
        "-t",
        "--starttls",
        "--sneaky",
        "--severity",
        "--connect-timeout",
        "--openssl-timeout",
    ],
    target_options: &["--ip"],
    denied_options: &[
        "-iL",
        "--file",
        "--openssl",
        "--add-ca",
        "--ca-bundles",
        "--mtls",
        "--logfile",
        "--log",
        "--jsonfile",
        "--jsonfile-pretty",
        "--json",
        "--json-pretty",
        "--csvfile",
        "--csv",
        "--htmlfile",
        "--html",
        "--outfile",
        "--outFile",
        "--outprefix",
        "--append",
        "--overwrite",
        "--proxy",
        "--mapping",
        "--phone-out",
    ],
    getopt_short: false,
    ..ArgGrammar::plain(PositionalKind::Url)
};

const NIKTO: ArgGrammar = ArgGrammar {
    value_options: &[
        "-p",
        "-port",
        "-T",
        "-Tuning",
        "-timeout",
        "-maxtime",
        "-Pause",
        "-root",
        "-vhost",
        "-id",
        "-Display",
        "-mutate",
        "-evasion",
        "-useragent",
    ],
    target_options: &["-h", "-host", "-useproxy"],
    denied_options: &[
        "-o",
        "-output",
        "-Format",
        "-config",
        "-Save",
        "-update",
        "-dbcheck",
        "-list-plugins",
        "-Plugins",
        "-key",
        "-cert",
    ],
    getopt_short: false,
    ..ArgGrammar::plain(PositionalKind::Url)
};

const WHATWEB: ArgGrammar = ArgGrammar {
    value_options: &[
        "-a",
        "--aggression",
        "-U",
        "--user-agent",
        "--header",
        "--max-redirects",
        "--open-timeout",
        "--read-timeout",
        "-t",
        "--max-threads",
    ],
    target_options: &["--proxy"],
    denied_options: &[
        "-i",
        "--input-file",
        "--log-brief",
        "--log-verbose",
        "--log-errors",
        "--log-xml",
        "--log-json",
        "--log-json-verbose",
        "--log-magictree",
        "--log-object",
        "--log-mongo-database",
        "--log-sql",
        "--log-sql-create",
        "--log-elastic-index",
        "-p",
        "--plugins",
        "--custom-plugin",
        "--dorks",
    ],
    ..ArgGrammar::plain(PositionalKind::Url)
};

const MASSCAN: ArgGrammar = ArgGrammar {
    value_options: &[
        "-p",
        "--ports",
        "--rate",
        "--banners",
        "--retries",
        "--wait",
        "--ttl",
        "--exclude",
        "--source-port",
        "--adapter-port",
        "--top-ports",
    ],
    target_options: &[],
    target_list_options: &[],
    denied_options: &[
        "-c",
        "--conf",
        "-iL",
        "--includefile",
        "--excludefile",
        "-oX",
        "-oJ",
        "-oG",
        "-oL",
        "-oB",
        "-oD",
        "-oU",
        "--output-filename",
        "--output-format",
        "--readscan",
        "--pcap",
        "--pcap-payloads",
        "--nmap-payloads",
        "--adapter-ip",
        "--source-ip",
        "--adapter-mac",
        "--router-mac",
        "--echo",
        "--resume",
    ],
    privileged_options: &[],
    keywords: &[],
    positional: PositionalKind::Host,
    trailing_numbers: false,
    getopt_short: false,
    plus_options: false,
    at_server: false,
    reject_file_values: false,
};

const PING: ArgGrammar = ArgGrammar {
    value_options: &["-c", "--count", "-i", "-W", "-w", "-s", "-t", "-Q", "-l", "-p"],
    denied_options: &["-f", "-I", "-F"],
    ..ArgGrammar::plain(PositionalKind::Host)
};

/// The built-in catalog of tools
pub fn builtin_tools() -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            name: "ssh",
            binary: "ssh",
            description: "Run commands on remote servers",
            category: ToolCategory::Remote,
            capability: None,
            timeouts: TimeoutBounds::default(),
            default_args: &[],
            remote: true,
            enabled: true,
            grammar: ArgGrammar::plain(PositionalKind::Host),
        },
        ToolSpec {
            name: "nmap",
            binary: "nmap",
            description: "Scan ports and detect services",
            category: ToolCategory::Scan,
            capability: None,
            timeouts: TimeoutBounds::with_max(1800),
            default_args: &[],
            remote: false,
            enabled: true,
            grammar: NMAP,
        },
        ToolSpec {
            name: "dig",
            binary: "dig",
            description: "Query DNS records (A, MX, TXT, etc.)",
            category: ToolCategory::Dns,
            capability: None,
            timeouts: TimeoutBounds::default(),
            default_args: &[],
            remote: false,
            enabled: true,
            grammar: DIG,
        },
        ToolSpec {
            name: "host",
            binary: "host",
            description: "Quick DNS lookup",
            category: ToolCategory::Dns,
            capability: None,
            timeouts: TimeoutBounds::default(),
            default_args: &[],
            remote: false,
            enabled: true,
            grammar: HOST,
        },
        ToolSpec {
            name: "whois",
            binary: "whois",
            description: "Query domain registration info",
            category: ToolCategory::Dns,
            capability: None,
            timeouts: TimeoutBounds::default(),
            default_args: &[],
            remote: false,
            enabled: true,
            grammar: WHOIS,
        },
        ToolSpec {
            name: "curl",
            binary: "curl",
            description: "Fetch URLs and test HTTP endpoints",
            category: ToolCategory::Web,
            capability: None,
            timeouts: TimeoutBounds::default(),
            default_args: &[],
            remote: false,
            enabled: true,
            grammar: CURL,
        },
        ToolSpec {
            name: "traceroute",
            binary: "traceroute",
            description: "Show network path to host",
            category: ToolCategory::Network,
            capability: Some(Capability::NetRaw),
            timeouts: TimeoutBounds::default(),
            default_args: &[],
            remote: false,
            enabled: true,
            grammar: TRACEROUTE,
        },
        ToolSpec {
            name: "mtr",
            binary: "mtr",
            description: "Live network diagnostics (traceroute + ping)",
            category: ToolCategory::Network,
            capability: Some(Capability::NetRaw),
            timeouts: TimeoutBounds::default(),
            default_args: &[
                (&["-r", "--report"], &["-r"]),
                (&["-c", "--report-cycles"], &["-c", "10"]),
            ],
            remote: false,
            enabled: true,
            grammar: MTR,
        },
        ToolSpec {
            name: "nc",
            binary: "nc",
            description: "Connect to TCP/UDP ports",
            category: ToolCategory::Network,
            capability: None,
            timeouts: TimeoutBounds::default(),
            default_args: &[],
            remote: false,
            enabled: true,
            grammar: NC,
        },
        ToolSpec {
            name: "sslscan",
            binary: "sslscan",
            description: "Test SSL/TLS cipher suites",
            category: ToolCategory::Tls,
            capability: None,
            timeouts: TimeoutBounds::default(),
            default_args: &[],
            remote: false,
            enabled: true,
            grammar: SSLSCAN,
        },
        ToolSpec {
            name: "testssl",
            binary: "testssl.sh",
            description: "Comprehensive TLS security audit",
            category: ToolCategory::Tls,
            capability: None,
            timeouts: TimeoutBounds::with_max(600),
            default_args: &[],
            remote: false,
            enabled: true,
            grammar: TESTSSL,
        },
        ToolSpec {
            name: "nikto",
            binary: "nikto",
            description: "Scan web servers for vulnerabilities",
            category: ToolCategory::Web,
            capability: None,
            timeouts: TimeoutBounds::with_max(1800),
            default_args: &[],
            remote: false,
            enabled: true,
            grammar: NIKTO,
        },
        ToolSpec {
            name: "whatweb",
            binary: "whatweb",
            description: "Detect web technologies",
            category: ToolCategory::Web,
            capability: None,
            timeouts: TimeoutBounds::default(),
            default_args: &[],
            remote: false,
            enabled: true,
            grammar: WHATWEB,
        },
        ToolSpec {
            name: "masscan",
            binary: "masscan",
            description: "Fast mass port scanner",
            category: ToolCategory::Scan,
            capability: Some(Capability::NetRaw),
            timeouts: TimeoutBounds::with_max(1800),
            default_args: &[],
            remote: false,
            enabled: true,
            grammar: MASSCAN,
        },
        ToolSpec {
            name: "ping",
            binary: "ping",
            description: "Test host connectivity",
            category: ToolCategory::Network,
            capability: None,
            timeouts: TimeoutBounds::default(),
            default_args: &[(&["-c", "--count"], &["-c", "4"])],
            remote: false,
            enabled: true,
            grammar: PING,
        },
    ]
}
