// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! JSON builders shaped like the Admin reporting API responses.

use chrono::NaiveDate;
use serde_json::{Value, json};

/// One cost report line. `cents` is the raw minor-unit decimal string.
pub fn cost_line(workspace: Option<&str>, model: &str, token_type: &str, cents: &str) -> Value {
    json!({
        "currency": "USD",
        "amount": cents,
        "workspace_id": workspace,
        "description": format!("{model} {token_type}"),
        "cost_type": "tokens",
        "context_window": "0-200k",
        "model": model,
        "service_tier": "standard",
        "token_type": token_type
    })
}

/// One messages usage line with nested cache and tool-use sub-objects.
pub fn usage_line(
    api_key: Option<&str>,
    workspace: Option<&str>,
    model: &str,
    uncached_input: u64,
    output: u64,
) -> Value {
    json!({
        "api_key_id": api_key,
        "workspace_id": workspace,
        "model": model,
        "service_tier": "standard",
        "context_window": "0-200k",
        "uncached_input_tokens": uncached_input,
        "cache_creation": {
            "ephemeral_1h_input_tokens": 0,
            "ephemeral_5m_input_tokens": 0
        },
        "cache_read_input_tokens": 0,
        "output_tokens": output,
        "server_tool_use": {"web_search_requests": 0}
    })
}

/// One Claude Code record for a user actor. Carries a `model_breakdown`
/// with tokens and an estimated cost, as the real endpoint does.
pub fn claude_code_line(date: NaiveDate, email: &str, terminal: &str, sessions: u64) -> Value {
    json!({
        "date": format!("{}T00:00:00Z", date.format("%Y-%m-%d")),
        "actor": {"type": "user_actor", "email_address": email},
        "organization_id": "org-test",
        "customer_type": "api",
        "terminal_type": terminal,
        "core_metrics": {
            "num_sessions": sessions,
            "lines_of_code": {"added": 120, "removed": 30},
            "commits_by_claude_code": 2,
            "pull_requests_by_claude_code": 1
        },
        "tool_actions": {
            "edit_tool": {"accepted": 10, "rejected": 1},
            "multi_edit_tool": {"accepted": 3, "rejected": 0},
            "write_tool": {"accepted": 4, "rejected": 2},
            "notebook_edit_tool": {"accepted": 0, "rejected": 0}
        },
        "model_breakdown": [{
            "model": "claude-sonnet-4-20250514",
            "tokens": {
                "input": 5000,
                "output": 2000,
                "cache_read": 100,
                "cache_creation": 50
            },
            "estimated_cost": {"currency": "USD", "amount": 1875}
        }]
    })
}

/// A bucketed page holding one daily bucket for `date`.
pub fn bucket_page(date: NaiveDate, results: Vec<Value>, next_page: Option<&str>) -> Value {
    let start = format!("{}T00:00:00Z", date.format("%Y-%m-%d"));
    let end = date
        .succ_opt()
        .map(|next| format!("{}T00:00:00Z", next.format("%Y-%m-%d")))
        .unwrap_or_else(|| start.clone());
    json!({
        "data": [{
            "starting_at": start,
            "ending_at": end,
            "results": results
        }],
        "has_more": next_page.is_some(),
        "next_page": next_page
    })
}

/// A page of a flat (non-bucketed) endpoint.
pub fn flat_page(data: Vec<Value>, next_page: Option<&str>) -> Value {
    json!({
        "data": data,
        "has_more": next_page.is_some(),
        "next_page": next_page
    })
}
