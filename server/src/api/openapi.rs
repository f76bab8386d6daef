//! OpenAPI specification and Swagger UI

use axum::http::header;
use axum::response::{Html, IntoResponse, Json};
use utoipa::OpenApi;

use crate::api::routes::{admin, directory, events, health, notifications, posts, tickets};
use crate::api::types::PaginationMeta;
use crate::data::cache::CacheStats;
use crate::data::portal::{
    AlumniProfile, Event, EventStats, EventStatus, Notification, Post, PostStatus, Ticket,
    TicketStatus,
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "AlumNet API",
        version = env!("CARGO_PKG_VERSION"),
        description = "Multi-tenant alumni portal backend"
    ),
    tags(
        (name = "health", description = "Health check endpoint"),
        (name = "posts", description = "Community feed posts"),
        (name = "events", description = "Alumni events and check-ins"),
        (name = "tickets", description = "Event tickets"),
        (name = "notifications", description = "Member notifications"),
        (name = "directory", description = "Alumni directory profiles"),
        (name = "admin", description = "Cache administration")
    ),
    paths(
        // Health
        health::health,
        // Posts
        posts::list_posts,
        posts::get_post,
        posts::create_post,
        posts::update_post,
        posts::delete_post,
        // Events
        events::list_events,
        events::get_event,
        events::get_event_by_slug,
        events::get_event_stats,
        events::create_event,
        events::update_event,
        events::check_in,
        events::checkin_tally,
        // Tickets
        tickets::list_tickets,
        tickets::my_tickets,
        tickets::get_ticket,
        tickets::purchase_ticket,
        // Notifications
        notifications::list_notifications,
        notifications::unread_count,
        notifications::create_notification,
        notifications::mark_all_read,
        // Directory
        directory::list_directory,
        directory::get_profile,
        directory::create_profile,
        directory::update_profile,
        // Admin
        admin::cache_status,
        admin::purge_cache,
    ),
    components(schemas(
        // API types
        PaginationMeta,
        // Health
        health::HealthResponse,
        // Portal models
        Post,
        PostStatus,
        Event,
        EventStatus,
        EventStats,
        Ticket,
        TicketStatus,
        Notification,
        AlumniProfile,
        // Posts
        posts::PostStatusFilter,
        posts::ListPostsQuery,
        posts::CreatePostRequest,
        posts::UpdatePostRequest,
        // Events
        events::EventStatusFilter,
        events::ListEventsQuery,
        events::CreateEventRequest,
        events::UpdateEventRequest,
        events::CheckinTally,
        // Tickets
        tickets::TicketStatusFilter,
        tickets::ListTicketsQuery,
        tickets::PurchaseTicketRequest,
        // Notifications
        notifications::ReadStateFilter,
        notifications::ListNotificationsQuery,
        notifications::CreateNotificationRequest,
        notifications::UnreadCount,
        notifications::MarkReadResult,
        // Directory
        directory::ListDirectoryQuery,
        directory::CreateProfileRequest,
        directory::UpdateProfileRequest,
        // Admin
        CacheStats,
        admin::CacheStatusDto,
        admin::PurgeRequest,
        admin::PurgeResultDto,
    ))
)]
pub struct ApiDoc;

/// Serve OpenAPI JSON specification
pub async fn openapi_json() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/json")],
        Json(ApiDoc::openapi()),
    )
}

/// Serve Swagger UI from CDN
pub async fn swagger_ui_html() -> Html<&'static str> {
    Html(SWAGGER_UI_HTML)
}

const SWAGGER_UI_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>AlumNet API Documentation</title>
    <link rel="stylesheet" type="text/css" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css">
    <style>
        html { box-sizing: border-box; overflow-y: scroll; }
        *, *:before, *:after { box-sizing: inherit; }
        body { margin: 0; background: #fafafa; }
    </style>
</head>
<body>
    <div id="swagger-ui"></div>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-standalone-preset.js"></script>
    <script>
        window.onload = () => {
            window.ui = SwaggerUIBundle({
                url: "/api/openapi.json",
                dom_id: '#swagger-ui',
                presets: [
                    SwaggerUIBundle.presets.apis,
                    SwaggerUIStandalonePreset
                ],
                layout: "StandaloneLayout",
                deepLinking: true,
                showExtensions: true,
                showCommonExtensions: true
            });
        };
    </script>
</body>
</html>"#;
