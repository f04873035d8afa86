use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::{error, warn};

use vigil_types::api::CommentResponse;

use crate::state::AppState;

const COMMENT_THREADS_URL: &str = "https://www.googleapis.com/youtube/v3/commentThreads";

/// Proxy for the upstream comment API. Failures surface as user-facing
/// messages and never touch watch records or access decisions.
pub async fn get_comments(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> Result<Json<Vec<CommentResponse>>, (StatusCode, String)> {
    let Some(api_key) = state.comment_api_key.as_deref() else {
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            "comment service is not configured".to_string(),
        ));
    };

    let response = state
        .http
        .get(COMMENT_THREADS_URL)
        .query(&[
            ("part", "snippet"),
            ("videoId", video_id.as_str()),
            ("order", "relevance"),
            ("maxResults", "20"),
            ("key", api_key),
        ])
        .send()
        .await
        .map_err(|e| {
            warn!("comment fetch failed for {}: {}", video_id, e);
            (
                StatusCode::BAD_GATEWAY,
                "comment service is unreachable".to_string(),
            )
        })?;

    let status = response.status();
    if !status.is_success() {
        let reason = response
            .json::<UpstreamErrorEnvelope>()
            .await
            .ok()
            .and_then(|envelope| envelope.error)
            .and_then(|e| e.errors.into_iter().next())
            .and_then(|item| item.reason);
        warn!(
            "upstream comment error {} for {} (reason: {:?})",
            status, video_id, reason
        );
        return Err(map_upstream_failure(status.as_u16(), reason.as_deref()));
    }

    let listing: ThreadListResponse = response.json().await.map_err(|e| {
        error!("malformed comment payload for {}: {}", video_id, e);
        (
            StatusCode::BAD_GATEWAY,
            "comment service returned a malformed response".to_string(),
        )
    })?;

    let comments = listing
        .items
        .into_iter()
        .map(|thread| {
            let comment = thread.snippet.top_level_comment;
            CommentResponse {
                id: comment.id,
                author_display_name: comment.snippet.author_display_name,
                author_profile_image_url: comment.snippet.author_profile_image_url,
                text_display: comment.snippet.text_display,
                like_count: comment.snippet.like_count,
                published_at: comment.snippet.published_at,
            }
        })
        .collect();

    Ok(Json(comments))
}

fn map_upstream_failure(status: u16, reason: Option<&str>) -> (StatusCode, String) {
    match (status, reason) {
        (403, Some("commentsDisabled")) => (
            StatusCode::FORBIDDEN,
            "comments are disabled for this video".to_string(),
        ),
        // Every other upstream 403 is quota exhaustion.
        (403, _) => (
            StatusCode::TOO_MANY_REQUESTS,
            "comment quota exceeded, try again later".to_string(),
        ),
        _ => (StatusCode::BAD_GATEWAY, "comment service error".to_string()),
    }
}

// Upstream commentThreads shapes, reduced to the fields served.

#[derive(Debug, Deserialize)]
struct ThreadListResponse {
    #[serde(default)]
    items: Vec<CommentThread>,
}

#[derive(Debug, Deserialize)]
struct CommentThread {
    snippet: ThreadSnippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThreadSnippet {
    top_level_comment: TopLevelComment,
}

#[derive(Debug, Deserialize)]
struct TopLevelComment {
    id: String,
    snippet: CommentSnippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentSnippet {
    author_display_name: String,
    author_profile_image_url: String,
    text_display: String,
    #[serde(default)]
    like_count: u64,
    published_at: String,
}

#[derive(Debug, Deserialize)]
struct UpstreamErrorEnvelope {
    error: Option<UpstreamError>,
}

#[derive(Debug, Deserialize)]
struct UpstreamError {
    #[serde(default)]
    errors: Vec<UpstreamErrorItem>,
}

#[derive(Debug, Deserialize)]
struct UpstreamErrorItem {
    reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_mapping() {
        assert_eq!(
            map_upstream_failure(403, Some("commentsDisabled")).0,
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            map_upstream_failure(403, Some("quotaExceeded")).0,
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(map_upstream_failure(403, None).0, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(map_upstream_failure(500, None).0, StatusCode::BAD_GATEWAY);
        assert_eq!(map_upstream_failure(404, None).0, StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_upstream_payload_parses() {
        let payload = r#"{
            "items": [{
                "id": "thread-1",
                "snippet": {
                    "topLevelComment": {
                        "id": "comment-1",
                        "snippet": {
                            "authorDisplayName": "viewer",
                            "authorProfileImageUrl": "https://example.com/a.png",
                            "authorChannelUrl": "https://example.com/c",
                            "textDisplay": "nice <b>video</b>",
                            "likeCount": 7,
                            "publishedAt": "2024-03-10T12:00:00Z",
                            "updatedAt": "2024-03-10T12:00:00Z"
                        }
                    }
                }
            }]
        }"#;

        let listing: ThreadListResponse = serde_json::from_str(payload).unwrap();
        assert_eq!(listing.items.len(), 1);
        let comment = &listing.items[0].snippet.top_level_comment;
        assert_eq!(comment.id, "comment-1");
        assert_eq!(comment.snippet.like_count, 7);
        assert_eq!(comment.snippet.text_display, "nice <b>video</b>");
    }

    #[test]
    fn test_error_envelope_parses() {
        let payload = r#"{
            "error": {
                "code": 403,
                "message": "disabled",
                "errors": [{"reason": "commentsDisabled", "domain": "youtube.commentThread"}]
            }
        }"#;

        let envelope: UpstreamErrorEnvelope = serde_json::from_str(payload).unwrap();
        let reason = envelope
            .error
            .and_then(|e| e.errors.into_iter().next())
            .and_then(|item| item.reason);
        assert_eq!(reason.as_deref(), Some("commentsDisabled"));
    }
}
