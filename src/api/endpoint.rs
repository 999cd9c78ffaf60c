//! Fixed responses for the HTTP style stats paths. Events only live in the user's local database,
//! so these paths never return data. They answer with a note pointing at the local API instead.

use serde_json::json;

pub const STATS_PATH: &str = "/stats";
pub const RAW_STATS_PATH: &str = "/stats/raw";
pub const API_STATS_PATH: &str = "/api/stats";

const CORS_HEADERS: [(&str, &str); 3] = [
    ("Access-Control-Allow-Origin", "*"),
    ("Access-Control-Allow-Methods", "GET, OPTIONS"),
    ("Access-Control-Allow-Headers", "Content-Type"),
];

const JSON_HEADERS: [(&str, &str); 2] = [
    ("Content-Type", "application/json"),
    ("Cache-Control", "no-cache, no-store, must-revalidate"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubResponse {
    pub status: u16,
    pub headers: Vec<(&'static str, &'static str)>,
    pub body: String,
}

impl StubResponse {
    fn json(status: u16, body: String) -> Self {
        Self {
            status,
            headers: JSON_HEADERS.into_iter().chain(CORS_HEADERS).collect(),
            body,
        }
    }

    pub fn header(&self, name: &str) -> Option<&'static str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| *value)
    }
}

/// Answers a request for `path`. `method` is compared case-insensitively.
pub fn respond(path: &str, method: &str) -> StubResponse {
    let Some(body) = stub_body(path) else {
        return StubResponse::json(404, json!({ "error": "Not found" }).to_string());
    };

    if method.eq_ignore_ascii_case("OPTIONS") {
        StubResponse {
            status: 200,
            headers: CORS_HEADERS.to_vec(),
            body: String::new(),
        }
    } else if method.eq_ignore_ascii_case("GET") {
        StubResponse::json(200, body)
    } else {
        StubResponse::json(405, json!({ "error": "Method not allowed" }).to_string())
    }
}

fn stub_body(path: &str) -> Option<String> {
    const MESSAGE: &str = "This endpoint requires client-side data access because events are kept in local storage.";

    let body = match path.trim_end_matches('/') {
        STATS_PATH => json!({
            "error": "Client-side data access required",
            "message": MESSAGE,
            "suggestion": "Use the stats command or the local API to read statistics.",
        })
        .to_string(),
        RAW_STATS_PATH => serde_json::to_string_pretty(&json!({
            "error": "Client-side data access required",
            "message": MESSAGE,
            "instructions": "Use the stats command with --json to get the actual JSON data.",
            "note": "The export command writes the same JSON into a file.",
        }))
        .ok()?,
        API_STATS_PATH => json!({
            "error": "Server-side data access not available",
            "message": MESSAGE,
            "instructions": "Call get_stats from the local API to get the actual data.",
        })
        .to_string(),
        _ => return None,
    };
    Some(body)
}
