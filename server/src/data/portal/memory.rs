//! In-memory portal repository
//!
//! DashMap-backed implementation of [`PortalRepository`] for local
//! development and tests. Rows are keyed `org_id/row_id`, so tenant
//! scoping is a prefix filter over each table.

use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use async_trait::async_trait;

use super::model::*;
use super::{PortalError, PortalRepository};

pub struct MemoryPortal {
    posts: DashMap<String, Post>,
    events: DashMap<String, Event>,
    tickets: DashMap<String, Ticket>,
    notifications: DashMap<String, Notification>,
    profiles: DashMap<String, AlumniProfile>,
    checkins: DashMap<String, u64>,
}

impl MemoryPortal {
    pub fn new() -> Self {
        Self {
            posts: DashMap::new(),
            events: DashMap::new(),
            tickets: DashMap::new(),
            notifications: DashMap::new(),
            profiles: DashMap::new(),
            checkins: DashMap::new(),
        }
    }

    fn row_key(org_id: &str, id: &str) -> String {
        format!("{org_id}/{id}")
    }
}

impl Default for MemoryPortal {
    fn default() -> Self {
        Self::new()
    }
}

fn paginate<T>(items: Vec<T>, page: u32, limit: u32) -> (Vec<T>, u64) {
    let total = items.len() as u64;
    let page = page.max(1);
    let limit = limit.max(1);
    let start = ((page - 1) as usize).saturating_mul(limit as usize);
    let page_items = items.into_iter().skip(start).take(limit as usize).collect();
    (page_items, total)
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[async_trait]
impl PortalRepository for MemoryPortal {
    // ==================== Posts ====================

    async fn list_posts(
        &self,
        org_id: &str,
        params: &PostListParams,
    ) -> Result<(Vec<Post>, u64), PortalError> {
        let mut rows: Vec<Post> = self
            .posts
            .iter()
            .filter(|e| e.org_id == org_id)
            .filter(|e| params.include_archived || !e.archived)
            .filter(|e| params.status.is_none_or(|s| e.status == s))
            .filter(|e| {
                params.search.as_deref().is_none_or(|q| {
                    contains_ci(&e.title, q) || contains_ci(&e.body, q)
                })
            })
            .filter(|e| {
                // Any requested tag qualifies a post
                params.tags.is_empty()
                    || params
                        .tags
                        .iter()
                        .any(|t| e.tags.iter().any(|pt| pt.eq_ignore_ascii_case(t)))
            })
            .filter(|e| params.date_start.is_none_or(|d| e.created_at >= d))
            .filter(|e| params.date_end.is_none_or(|d| e.created_at <= d))
            .map(|e| e.clone())
            .collect();

        rows.sort_by(|a, b| {
            let ord = a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id));
            if params.ascending { ord } else { ord.reverse() }
        });

        Ok(paginate(rows, params.page, params.limit))
    }

    async fn get_post(&self, org_id: &str, id: &str) -> Result<Option<Post>, PortalError> {
        Ok(self
            .posts
            .get(&Self::row_key(org_id, id))
            .map(|e| e.clone()))
    }

    async fn create_post(&self, org_id: &str, post: NewPost) -> Result<Post, PortalError> {
        let now = Utc::now();
        let row = Post {
            id: Uuid::new_v4().to_string(),
            org_id: org_id.to_string(),
            author_id: post.author_id,
            title: post.title,
            body: post.body,
            tags: post.tags,
            status: post.status,
            archived: false,
            created_at: now,
            updated_at: now,
        };
        self.posts
            .insert(Self::row_key(org_id, &row.id), row.clone());
        Ok(row)
    }

    async fn update_post(
        &self,
        org_id: &str,
        id: &str,
        patch: PostPatch,
    ) -> Result<Option<Post>, PortalError> {
        let key = Self::row_key(org_id, id);
        let Some(mut entry) = self.posts.get_mut(&key) else {
            return Ok(None);
        };
        if let Some(title) = patch.title {
            entry.title = title;
        }
        if let Some(body) = patch.body {
            entry.body = body;
        }
        if let Some(tags) = patch.tags {
            entry.tags = tags;
        }
        if let Some(status) = patch.status {
            entry.status = status;
        }
        if let Some(archived) = patch.archived {
            entry.archived = archived;
        }
        entry.updated_at = Utc::now();
        Ok(Some(entry.clone()))
    }

    async fn delete_post(&self, org_id: &str, id: &str) -> Result<bool, PortalError> {
        Ok(self.posts.remove(&Self::row_key(org_id, id)).is_some())
    }

    // ==================== Events ====================

    async fn list_events(
        &self,
        org_id: &str,
        params: &EventListParams,
    ) -> Result<(Vec<Event>, u64), PortalError> {
        let mut rows: Vec<Event> = self
            .events
            .iter()
            .filter(|e| e.org_id == org_id)
            .filter(|e| params.status.is_none_or(|s| e.status == s))
            .filter(|e| {
                params.search.as_deref().is_none_or(|q| {
                    contains_ci(&e.title, q) || contains_ci(&e.description, q)
                })
            })
            .filter(|e| params.date_start.is_none_or(|d| e.starts_at >= d))
            .filter(|e| params.date_end.is_none_or(|d| e.starts_at <= d))
            .map(|e| e.clone())
            .collect();

        rows.sort_by(|a, b| {
            let ord = a.starts_at.cmp(&b.starts_at).then(a.id.cmp(&b.id));
            if params.ascending { ord } else { ord.reverse() }
        });

        Ok(paginate(rows, params.page, params.limit))
    }

    async fn get_event(&self, org_id: &str, id: &str) -> Result<Option<Event>, PortalError> {
        Ok(self
            .events
            .get(&Self::row_key(org_id, id))
            .map(|e| e.clone()))
    }

    async fn get_event_by_slug(
        &self,
        org_id: &str,
        slug: &str,
    ) -> Result<Option<Event>, PortalError> {
        Ok(self
            .events
            .iter()
            .find(|e| e.org_id == org_id && e.slug == slug)
            .map(|e| e.clone()))
    }

    async fn create_event(&self, org_id: &str, event: NewEvent) -> Result<Event, PortalError> {
        if self.get_event_by_slug(org_id, &event.slug).await?.is_some() {
            return Err(PortalError::Conflict(format!(
                "event slug '{}' already exists",
                event.slug
            )));
        }
        let row = Event {
            id: Uuid::new_v4().to_string(),
            org_id: org_id.to_string(),
            slug: event.slug,
            title: event.title,
            description: event.description,
            location: event.location,
            status: EventStatus::Upcoming,
            capacity: event.capacity,
            starts_at: event.starts_at,
            ends_at: event.ends_at,
            created_at: Utc::now(),
        };
        self.events
            .insert(Self::row_key(org_id, &row.id), row.clone());
        Ok(row)
    }

    async fn update_event(
        &self,
        org_id: &str,
        id: &str,
        patch: EventPatch,
    ) -> Result<Option<Event>, PortalError> {
        let key = Self::row_key(org_id, id);
        let Some(mut entry) = self.events.get_mut(&key) else {
            return Ok(None);
        };
        if let Some(title) = patch.title {
            entry.title = title;
        }
        if let Some(description) = patch.description {
            entry.description = description;
        }
        if let Some(location) = patch.location {
            entry.location = location;
        }
        if let Some(status) = patch.status {
            entry.status = status;
        }
        if let Some(capacity) = patch.capacity {
            entry.capacity = capacity;
        }
        Ok(Some(entry.clone()))
    }

    async fn record_checkin(
        &self,
        org_id: &str,
        event_id: &str,
    ) -> Result<Option<u64>, PortalError> {
        let key = Self::row_key(org_id, event_id);
        if !self.events.contains_key(&key) {
            return Ok(None);
        }
        let mut counter = self.checkins.entry(key).or_insert(0);
        *counter += 1;
        Ok(Some(*counter))
    }

    async fn checkin_count(
        &self,
        org_id: &str,
        event_id: &str,
    ) -> Result<Option<u64>, PortalError> {
        let key = Self::row_key(org_id, event_id);
        if !self.events.contains_key(&key) {
            return Ok(None);
        }
        Ok(Some(self.checkins.get(&key).map(|c| *c).unwrap_or(0)))
    }

    async fn event_stats(&self, org_id: &str) -> Result<EventStats, PortalError> {
        let total_events = self.events.iter().filter(|e| e.org_id == org_id).count() as u64;
        let upcoming_events = self
            .events
            .iter()
            .filter(|e| e.org_id == org_id && e.status == EventStatus::Upcoming)
            .count() as u64;
        let tickets_sold = self
            .tickets
            .iter()
            .filter(|t| t.org_id == org_id && t.status != TicketStatus::Cancelled)
            .count() as u64;
        let prefix = format!("{org_id}/");
        let checkins = self
            .checkins
            .iter()
            .filter(|c| c.key().starts_with(&prefix))
            .map(|c| *c.value())
            .sum();

        Ok(EventStats {
            total_events,
            upcoming_events,
            tickets_sold,
            checkins,
        })
    }

    // ==================== Tickets ====================

    async fn list_tickets(
        &self,
        org_id: &str,
        params: &TicketListParams,
    ) -> Result<(Vec<Ticket>, u64), PortalError> {
        let mut rows: Vec<Ticket> = self
            .tickets
            .iter()
            .filter(|t| t.org_id == org_id)
            .filter(|t| params.status.is_none_or(|s| t.status == s))
            .filter(|t| {
                params
                    .event_id
                    .as_deref()
                    .is_none_or(|e| t.event_id == e)
            })
            .filter(|t| {
                params
                    .holder_id
                    .as_deref()
                    .is_none_or(|h| t.holder_id == h)
            })
            .map(|t| t.clone())
            .collect();

        rows.sort_by(|a, b| {
            let ord = a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id));
            if params.ascending { ord } else { ord.reverse() }
        });

        Ok(paginate(rows, params.page, params.limit))
    }

    async fn get_ticket(&self, org_id: &str, id: &str) -> Result<Option<Ticket>, PortalError> {
        Ok(self
            .tickets
            .get(&Self::row_key(org_id, id))
            .map(|t| t.clone()))
    }

    async fn purchase_ticket(
        &self,
        org_id: &str,
        event_id: &str,
        holder_id: &str,
    ) -> Result<Ticket, PortalError> {
        let Some(event) = self.get_event(org_id, event_id).await? else {
            return Err(PortalError::NotFound("event"));
        };

        let sold = self
            .tickets
            .iter()
            .filter(|t| {
                t.org_id == org_id
                    && t.event_id == event_id
                    && t.status != TicketStatus::Cancelled
            })
            .count() as u32;
        if sold >= event.capacity {
            return Err(PortalError::Conflict(format!(
                "event '{}' is at capacity",
                event.slug
            )));
        }

        let row = Ticket {
            id: Uuid::new_v4().to_string(),
            org_id: org_id.to_string(),
            event_id: event_id.to_string(),
            holder_id: holder_id.to_string(),
            status: TicketStatus::Paid,
            created_at: Utc::now(),
        };
        self.tickets
            .insert(Self::row_key(org_id, &row.id), row.clone());
        Ok(row)
    }

    // ==================== Notifications ====================

    async fn list_notifications(
        &self,
        org_id: &str,
        recipient_id: &str,
        filter: ReadFilter,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<Notification>, u64), PortalError> {
        let mut rows: Vec<Notification> = self
            .notifications
            .iter()
            .filter(|n| n.org_id == org_id && n.recipient_id == recipient_id)
            .filter(|n| match filter {
                ReadFilter::All => true,
                ReadFilter::Unread => !n.read,
                ReadFilter::Read => n.read,
            })
            .map(|n| n.clone())
            .collect();

        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        Ok(paginate(rows, page, limit))
    }

    async fn unread_count(&self, org_id: &str, recipient_id: &str) -> Result<u64, PortalError> {
        Ok(self
            .notifications
            .iter()
            .filter(|n| n.org_id == org_id && n.recipient_id == recipient_id && !n.read)
            .count() as u64)
    }

    async fn create_notification(
        &self,
        org_id: &str,
        recipient_id: &str,
        title: &str,
        body: &str,
    ) -> Result<Notification, PortalError> {
        let row = Notification {
            id: Uuid::new_v4().to_string(),
            org_id: org_id.to_string(),
            recipient_id: recipient_id.to_string(),
            title: title.to_string(),
            body: body.to_string(),
            read: false,
            created_at: Utc::now(),
        };
        self.notifications
            .insert(Self::row_key(org_id, &row.id), row.clone());
        Ok(row)
    }

    async fn mark_all_read(&self, org_id: &str, recipient_id: &str) -> Result<u64, PortalError> {
        let mut flipped = 0u64;
        for mut entry in self.notifications.iter_mut() {
            if entry.org_id == org_id && entry.recipient_id == recipient_id && !entry.read {
                entry.read = true;
                flipped += 1;
            }
        }
        Ok(flipped)
    }

    // ==================== Alumni directory ====================

    async fn list_profiles(
        &self,
        org_id: &str,
        params: &DirectoryListParams,
    ) -> Result<(Vec<AlumniProfile>, u64), PortalError> {
        let mut rows: Vec<AlumniProfile> = self
            .profiles
            .iter()
            .filter(|p| p.org_id == org_id)
            .filter(|p| params.grad_year.is_none_or(|y| p.grad_year == y))
            .filter(|p| {
                params.search.as_deref().is_none_or(|q| {
                    contains_ci(&p.name, q)
                        || contains_ci(&p.email, q)
                        || contains_ci(&p.department, q)
                        || contains_ci(&p.city, q)
                })
            })
            .map(|p| p.clone())
            .collect();

        rows.sort_by(|a, b| {
            let ord = a.name.cmp(&b.name).then(a.id.cmp(&b.id));
            if params.ascending { ord } else { ord.reverse() }
        });

        Ok(paginate(rows, params.page, params.limit))
    }

    async fn get_profile(
        &self,
        org_id: &str,
        id: &str,
    ) -> Result<Option<AlumniProfile>, PortalError> {
        Ok(self
            .profiles
            .get(&Self::row_key(org_id, id))
            .map(|p| p.clone()))
    }

    async fn create_profile(
        &self,
        org_id: &str,
        profile: AlumniProfile,
    ) -> Result<AlumniProfile, PortalError> {
        self.profiles
            .insert(Self::row_key(org_id, &profile.id), profile.clone());
        Ok(profile)
    }

    async fn update_profile(
        &self,
        org_id: &str,
        id: &str,
        patch: ProfilePatch,
    ) -> Result<Option<AlumniProfile>, PortalError> {
        let key = Self::row_key(org_id, id);
        let Some(mut entry) = self.profiles.get_mut(&key) else {
            return Ok(None);
        };
        if let Some(name) = patch.name {
            entry.name = name;
        }
        if let Some(department) = patch.department {
            entry.department = department;
        }
        if let Some(city) = patch.city {
            entry.city = city;
        }
        if let Some(bio) = patch.bio {
            entry.bio = bio;
        }
        entry.updated_at = Utc::now();
        Ok(Some(entry.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_post(author: &str, title: &str) -> NewPost {
        NewPost {
            author_id: author.to_string(),
            title: title.to_string(),
            body: format!("{title} body"),
            tags: vec!["reunion".to_string()],
            status: PostStatus::Published,
        }
    }

    fn new_event(slug: &str, capacity: u32) -> NewEvent {
        let starts = Utc::now() + Duration::days(7);
        NewEvent {
            slug: slug.to_string(),
            title: slug.to_string(),
            description: "An event".to_string(),
            location: "Main hall".to_string(),
            capacity,
            starts_at: starts,
            ends_at: starts + Duration::hours(3),
        }
    }

    #[tokio::test]
    async fn test_post_crud_and_tenant_scoping() {
        let repo = MemoryPortal::new();

        let created = repo.create_post("t1", new_post("u1", "Hello")).await.unwrap();
        assert_eq!(repo.get_post("t1", &created.id).await.unwrap().unwrap().title, "Hello");

        // Another tenant cannot see or delete it
        assert!(repo.get_post("t2", &created.id).await.unwrap().is_none());
        assert!(!repo.delete_post("t2", &created.id).await.unwrap());

        let patched = repo
            .update_post(
                "t1",
                &created.id,
                PostPatch {
                    archived: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert!(patched.archived);

        assert!(repo.delete_post("t1", &created.id).await.unwrap());
        assert!(repo.get_post("t1", &created.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_post_list_filters_and_pagination() {
        let repo = MemoryPortal::new();
        for i in 0..5 {
            repo.create_post("t1", new_post("u1", &format!("Post {i}")))
                .await
                .unwrap();
        }
        let mut draft = new_post("u1", "Draft post");
        draft.status = PostStatus::Draft;
        repo.create_post("t1", draft).await.unwrap();

        let params = PostListParams {
            status: Some(PostStatus::Published),
            page: 1,
            limit: 2,
            ..Default::default()
        };
        let (page, total) = repo.list_posts("t1", &params).await.unwrap();
        assert_eq!(total, 5);
        assert_eq!(page.len(), 2);

        let (search, total) = repo
            .list_posts(
                "t1",
                &PostListParams {
                    search: Some("post 3".to_string()),
                    page: 1,
                    limit: 10,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(search[0].title, "Post 3");
    }

    #[tokio::test]
    async fn test_event_slug_lookup_and_conflict() {
        let repo = MemoryPortal::new();
        let event = repo.create_event("t1", new_event("gala-2026", 100)).await.unwrap();

        let found = repo.get_event_by_slug("t1", "gala-2026").await.unwrap().unwrap();
        assert_eq!(found.id, event.id);
        assert!(repo.get_event_by_slug("t2", "gala-2026").await.unwrap().is_none());

        let dup = repo.create_event("t1", new_event("gala-2026", 50)).await;
        assert!(matches!(dup, Err(PortalError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_ticket_capacity_enforced() {
        let repo = MemoryPortal::new();
        let event = repo.create_event("t1", new_event("tiny", 2)).await.unwrap();

        repo.purchase_ticket("t1", &event.id, "u1").await.unwrap();
        repo.purchase_ticket("t1", &event.id, "u2").await.unwrap();
        let third = repo.purchase_ticket("t1", &event.id, "u3").await;
        assert!(matches!(third, Err(PortalError::Conflict(_))));

        let missing = repo.purchase_ticket("t1", "no-such-event", "u1").await;
        assert!(matches!(missing, Err(PortalError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_checkins_and_stats() {
        let repo = MemoryPortal::new();
        let event = repo.create_event("t1", new_event("meetup", 10)).await.unwrap();

        assert_eq!(repo.checkin_count("t1", &event.id).await.unwrap(), Some(0));
        assert_eq!(repo.record_checkin("t1", &event.id).await.unwrap(), Some(1));
        assert_eq!(repo.record_checkin("t1", &event.id).await.unwrap(), Some(2));
        assert_eq!(repo.checkin_count("t1", &event.id).await.unwrap(), Some(2));
        assert_eq!(repo.record_checkin("t1", "missing").await.unwrap(), None);
        assert_eq!(repo.checkin_count("t1", "missing").await.unwrap(), None);

        repo.purchase_ticket("t1", &event.id, "u1").await.unwrap();

        let stats = repo.event_stats("t1").await.unwrap();
        assert_eq!(stats.total_events, 1);
        assert_eq!(stats.upcoming_events, 1);
        assert_eq!(stats.tickets_sold, 1);
        assert_eq!(stats.checkins, 2);

        // Stats are tenant-local
        let other = repo.event_stats("t2").await.unwrap();
        assert_eq!(other.total_events, 0);
        assert_eq!(other.checkins, 0);
    }

    #[tokio::test]
    async fn test_notifications_read_flow() {
        let repo = MemoryPortal::new();
        repo.create_notification("t1", "u1", "Welcome", "Hi").await.unwrap();
        repo.create_notification("t1", "u1", "Event", "New event").await.unwrap();
        repo.create_notification("t1", "u2", "Welcome", "Hi").await.unwrap();

        assert_eq!(repo.unread_count("t1", "u1").await.unwrap(), 2);

        let (unread, total) = repo
            .list_notifications("t1", "u1", ReadFilter::Unread, 1, 10)
            .await
            .unwrap();
        assert_eq!(total, 2);
        assert_eq!(unread.len(), 2);

        assert_eq!(repo.mark_all_read("t1", "u1").await.unwrap(), 2);
        assert_eq!(repo.unread_count("t1", "u1").await.unwrap(), 0);
        // Other recipients untouched
        assert_eq!(repo.unread_count("t1", "u2").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_directory_search() {
        let repo = MemoryPortal::new();
        let now = Utc::now();
        for (id, name, year) in [("p1", "Ada Alum", 2015), ("p2", "Ben Grad", 2018)] {
            repo.create_profile(
                "t1",
                AlumniProfile {
                    id: id.to_string(),
                    org_id: "t1".to_string(),
                    name: name.to_string(),
                    email: format!("{id}@example.edu"),
                    grad_year: year,
                    department: "CS".to_string(),
                    city: "Pune".to_string(),
                    bio: String::new(),
                    created_at: now,
                    updated_at: now,
                },
            )
            .await
            .unwrap();
        }

        let (rows, total) = repo
            .list_profiles(
                "t1",
                &DirectoryListParams {
                    search: Some("ada".to_string()),
                    page: 1,
                    limit: 10,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(rows[0].name, "Ada Alum");

        let (rows, total) = repo
            .list_profiles(
                "t1",
                &DirectoryListParams {
                    grad_year: Some(2018),
                    page: 1,
                    limit: 10,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(rows[0].grad_year, 2018);
    }
}
