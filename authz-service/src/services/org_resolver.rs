//! Organization-id resolution.
//!
//! Pure function, no I/O. The precedence order is load-bearing: the path
//! parameter names the resource the route itself is scoped to, so it must
//! win over body and query content, which the caller fully controls. A
//! request cannot switch organizations by smuggling a different id into its
//! payload.

use serde_json::Value;

/// Accepted path parameter names, in match order.
const PATH_ALIASES: [&str; 3] = ["id", "organizationId", "orgId"];

/// Accepted body field / query parameter names, in match order.
const FIELD_ALIASES: [&str; 3] = ["organizationId", "orgId", "organization_id"];

/// Extracts the target organization id from a request's parameter locations.
///
/// Precedence, first match wins: path parameter, then JSON body field, then
/// query parameter. Identifiers are opaque strings here; the only validation
/// is non-empty after trimming. Returns `None` when nothing matches.
pub fn resolve_org_id(
    path_params: &[(String, String)],
    body: Option<&Value>,
    query: Option<&str>,
) -> Option<String> {
    for alias in PATH_ALIASES {
        if let Some((_, value)) = path_params.iter().find(|(name, _)| name == alias) {
            if let Some(value) = non_empty(value) {
                return Some(value);
            }
        }
    }

    if let Some(Value::Object(fields)) = body {
        for alias in FIELD_ALIASES {
            if let Some(value) = fields.get(alias) {
                let text = match value {
                    Value::String(s) => s.clone(),
                    Value::Number(n) => n.to_string(),
                    _ => continue,
                };
                if let Some(value) = non_empty(&text) {
                    return Some(value);
                }
            }
        }
    }

    if let Some(query) = query {
        let params: Vec<(String, String)> = serde_urlencoded::from_str(query).unwrap_or_default();
        for alias in FIELD_ALIASES {
            if let Some((_, value)) = params.iter().find(|(name, _)| name == alias) {
                if let Some(value) = non_empty(value) {
                    return Some(value);
                }
            }
        }
    }

    None
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
