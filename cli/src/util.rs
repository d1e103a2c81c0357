use std::path::PathBuf;

use serde_json::json;

pub fn client() -> reqwest::Client {
    reqwest::Client::new()
}

pub fn exit_error(message: &str, docs_hint: Option<&str>) -> ! {
    let mut err = json!({
        "error": "cli_error",
        "message": message
    });
    if let Some(hint) = docs_hint {
        err["docs_hint"] = json!(hint);
    }
    eprintln!("{}", serde_json::to_string_pretty(&err).unwrap());
    std::process::exit(4);
}

/// `<config_dir>/meteotrip`, falling back to `./meteotrip` when the platform
/// has no config directory.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("meteotrip")
}

/// API key for authenticated requests, or a usage error explaining how to get one.
pub fn require_key<'a>(api_key: Option<&'a str>, action: &str) -> &'a str {
    match api_key {
        Some(key) => key,
        None => exit_error(
            &format!("{action} requires an API key"),
            Some("Set --api-key or METEOTRIP_API_KEY. Create one with `meteotrip admin create-key`."),
        ),
    }
}

/// Print a JSON value, pretty unless `raw`.
pub fn print_json(value: &serde_json::Value, raw: bool) {
    let formatted = if raw {
        serde_json::to_string(value).unwrap()
    } else {
        serde_json::to_string_pretty(value).unwrap()
    };
    println!("{formatted}");
}

/// Exit code for an HTTP status: 0=2xx, 1=4xx, 2=anything else.
pub fn exit_code_for(status: u16) -> i32 {
    match status {
        200..=299 => 0,
        400..=499 => 1,
        _ => 2,
    }
}

/// Execute an API request, print response, exit with structured code.
///
/// Exit codes: 0=success (2xx), 1=client error (4xx), 2=server error (5xx),
///             3=connection error, 4=usage error
pub async fn api_request(
    api_url: &str,
    method: reqwest::Method,
    path: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
    query: &[(String, String)],
    raw: bool,
) -> i32 {
    let url = match build_url(api_url, path, query) {
        Ok(u) => u,
        Err(e) => {
            let err = json!({
                "error": "cli_error",
                "message": e
            });
            eprintln!("{}", serde_json::to_string_pretty(&err).unwrap());
            return 4;
        }
    };

    let mut req = client().request(method, url);
    if let Some(t) = token {
        req = req.header("Authorization", format!("Bearer {t}"));
    }
    if let Some(b) = body {
        req = req.json(&b);
    }

    let resp = match req.send().await {
        Ok(r) => r,
        Err(e) => {
            print_connection_error(&e);
            return 3;
        }
    };

    let status = resp.status().as_u16();
    let exit_code = exit_code_for(status);

    // 204 has no body to parse
    let resp_body: serde_json::Value = if status == 204 {
        json!({"status": status})
    } else {
        match resp.json().await {
            Ok(v) => v,
            Err(e) => json!({"raw_error": format!("Failed to parse response as JSON: {e}")}),
        }
    };

    if exit_code == 0 {
        print_json(&resp_body, raw);
    } else {
        eprintln!("{}", serde_json::to_string_pretty(&resp_body).unwrap());
    }

    exit_code
}

/// Execute an API request and return the response (no printing).
/// Used by commands that combine or post-process responses.
pub async fn raw_api_request(
    api_url: &str,
    method: reqwest::Method,
    path: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> Result<(u16, serde_json::Value), reqwest::Error> {
    let mut req = client().request(method, format!("{api_url}{path}"));
    if let Some(t) = token {
        req = req.header("Authorization", format!("Bearer {t}"));
    }
    if let Some(b) = body {
        req = req.json(&b);
    }

    let resp = req.send().await?;
    let status = resp.status().as_u16();
    let body: serde_json::Value = resp
        .json()
        .await
        .unwrap_or(json!({"error": "non-json response"}));

    Ok((status, body))
}

pub fn print_connection_error(e: &reqwest::Error) {
    let err = json!({
        "error": "connection_error",
        "message": format!("{e}"),
        "docs_hint": "Is the API server running? Check METEOTRIP_API_URL."
    });
    eprintln!("{}", serde_json::to_string_pretty(&err).unwrap());
}

fn build_url(
    api_url: &str,
    path: &str,
    query: &[(String, String)],
) -> Result<reqwest::Url, String> {
    let mut url = reqwest::Url::parse(&format!("{api_url}{path}"))
        .map_err(|e| format!("Invalid URL: {api_url}{path}: {e}"))?;
    if !query.is_empty() {
        let mut q = url.query_pairs_mut();
        for (k, v) in query {
            q.append_pair(k, v);
        }
    }
    Ok(url)
}

/// Read JSON from a file path or stdin (when path is "-").
pub fn read_json_from_file(path: &str) -> Result<serde_json::Value, String> {
    let raw = if path == "-" {
        std::io::read_to_string(std::io::stdin())
            .map_err(|e| format!("Failed to read stdin: {e}"))?
    } else {
        std::fs::read_to_string(path).map_err(|e| format!("Failed to read file '{path}': {e}"))?
    };
    serde_json::from_str(&raw).map_err(|e| format!("Invalid JSON in '{path}': {e}"))
}

// Unix-specific imports for file permissions
#[cfg(unix)]
pub use std::os::unix::fs::OpenOptionsExt;

// No-op on non-unix (won't compile for Windows without this)
#[cfg(not(unix))]
pub trait OpenOptionsExt {
    fn mode(&mut self, _mode: u32) -> &mut Self;
}

#[cfg(not(unix))]
impl OpenOptionsExt for std::fs::OpenOptions {
    fn mode(&mut self, _mode: u32) -> &mut Self {
        self
    }
}
