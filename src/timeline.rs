// ABOUTME: Walks a profile's timeline page by page and yields its media records
// ABOUTME: Resolves carousels and videos through the post page and paces every follow-up request

use log::{debug, info};
use rand::Rng;
use serde::Serialize;
use serde_json::Value;
use std::collections::VecDeque;
use std::thread;
use std::time::Duration;

use crate::config::DelayRange;
use crate::error::{malformed, AppError};
use crate::extract::{extract, ScriptMarker};
use crate::media::MediaRecord;
use crate::pages::{self, PostKind, TimelinePage};
use crate::session::AuthSession;

/// Posts requested per pagination query
pub const PAGE_SIZE: u32 = 12;

/// The loaded profile and the page currently being walked
#[derive(Debug, Clone)]
pub struct ProfileContext {
    pub profile_id: String,
    pub username: String,
    pub timeline: TimelinePage,
}

#[derive(Serialize)]
struct PageVariables<'a> {
    id: &'a str,
    first: u32,
    after: &'a str,
}

/// Loads profiles and hands out their post sequences
#[derive(Debug)]
pub struct TimelineWalker<'s> {
    session: &'s AuthSession,
    profile: Option<ProfileContext>,
}

impl<'s> TimelineWalker<'s> {
    /// Refuses sessions that have not logged in successfully
    pub fn new(session: &'s AuthSession) -> Result<Self, AppError> {
        session.ensure_authenticated()?;
        Ok(Self {
            session,
            profile: None,
        })
    }

    /// Fetch `username`'s profile page and keep its first timeline page
    pub fn load_profile(&mut self, username: &str) -> Result<(), AppError> {
        let url = format!("{}/{}", self.session.config().base_url, username);
        info!("Fetching profile {}", url);

        let response = self.session.http().get(&url).send()?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(AppError::ProfileNotFound(username.to_string()));
        }
        let html = response.error_for_status()?.text()?;

        let data = extract(&html, &ScriptMarker::shared_data()?)?;
        let user = pages::profile(data, username)?;

        debug!(
            "Profile {} has id {} and {} posts on its first page",
            user.username,
            user.id,
            user.edge_owner_to_timeline_media.edges.len()
        );

        self.profile = Some(ProfileContext {
            profile_id: user.id,
            username: user.username,
            timeline: user.edge_owner_to_timeline_media,
        });
        Ok(())
    }

    pub fn profile(&self) -> Option<&ProfileContext> {
        self.profile.as_ref()
    }

    /// Lazy sequence over the loaded profile's media, starting at its first
    /// page. The loaded profile is consumed; walking again needs a reload.
    pub fn posts(&mut self) -> Posts<'s> {
        Posts {
            session: self.session,
            state: WalkState::Idle(self.profile.take()),
            pending: VecDeque::new(),
        }
    }
}

enum WalkState {
    /// Nothing fetched or yielded yet
    Idle(Option<ProfileContext>),
    /// Yielding edges of the current page, starting at `next_edge`
    HasPage {
        profile: ProfileContext,
        next_edge: usize,
    },
    Exhausted,
    Failed,
}

/// Forward-only iterator over a profile's media.
///
/// Every pull does at most the requests needed to produce one more record.
/// After an error is yielded the sequence ends.
pub struct Posts<'s> {
    session: &'s AuthSession,
    state: WalkState,
    pending: VecDeque<MediaRecord>,
}

impl<'s> Posts<'s> {
    fn step(&mut self) -> Result<Option<MediaRecord>, AppError> {
        loop {
            if let Some(record) = self.pending.pop_front() {
                return Ok(Some(record));
            }

            match std::mem::replace(&mut self.state, WalkState::Failed) {
                WalkState::Idle(None) => return Err(AppError::NoProfileLoaded),
                WalkState::Idle(Some(profile)) => {
                    self.state = WalkState::HasPage {
                        profile,
                        next_edge: 0,
                    };
                }
                WalkState::HasPage {
                    mut profile,
                    next_edge,
                } => {
                    if let Some(edge) = profile.timeline.edges.get_mut(next_edge) {
                        let node = edge.node.take();
                        let records = self.resolve(&profile, &node)?;
                        self.pending.extend(records);
                        self.state = WalkState::HasPage {
                            profile,
                            next_edge: next_edge + 1,
                        };
                    } else if profile.timeline.page_info.has_next_page {
                        profile.timeline = self.fetch_next_page(&profile)?;
                        self.state = WalkState::HasPage {
                            profile,
                            next_edge: 0,
                        };
                    } else {
                        debug!("Timeline of {} exhausted", profile.username);
                        self.state = WalkState::Exhausted;
                    }
                }
                WalkState::Exhausted => {
                    self.state = WalkState::Exhausted;
                    return Ok(None);
                }
                WalkState::Failed => return Ok(None),
            }
        }
    }

    /// Media records for one timeline node, in display order
    fn resolve(
        &self,
        profile: &ProfileContext,
        node: &Value,
    ) -> Result<Vec<MediaRecord>, AppError> {
        match PostKind::of(node) {
            PostKind::Carousel => {
                let media = self.fetch_post(profile, pages::shortcode(node)?)?;
                pages::sidecar_children(media)?
                    .iter()
                    .map(|child| self.record(child))
                    .collect()
            }
            PostKind::Video => {
                let media = self.fetch_post(profile, pages::shortcode(node)?)?;
                Ok(vec![self.record(&media)?])
            }
            PostKind::Single => Ok(vec![self.record(node)?]),
        }
    }

    fn record(&self, node: &Value) -> Result<MediaRecord, AppError> {
        Ok(MediaRecord::from_node(node)?.with_http_client(self.session.http().clone()))
    }

    /// `graphql.shortcode_media` of a single post page
    fn fetch_post(&self, profile: &ProfileContext, shortcode: &str) -> Result<Value, AppError> {
        let url = format!("{}/p/{}/?_a=1", self.session.config().base_url, shortcode);

        pause(self.session.config().request_delay);
        debug!("Fetching post {}", url);

        let html = self
            .session
            .http()
            .get(&url)
            .send()?
            .error_for_status()?
            .text()?;

        let marker = ScriptMarker::additional_data(&profile.username, shortcode)?;
        pages::shortcode_media(extract(&html, &marker)?)
    }

    /// The page after the current one, via the paginated timeline query
    fn fetch_next_page(&self, profile: &ProfileContext) -> Result<TimelinePage, AppError> {
        let cursor = profile
            .timeline
            .page_info
            .end_cursor
            .as_deref()
            .ok_or_else(|| malformed("page reports more posts but has no end cursor"))?;

        let config = self.session.config();
        let variables = serde_json::to_string(&PageVariables {
            id: &profile.profile_id,
            first: PAGE_SIZE,
            after: cursor,
        })
        .map_err(|e| AppError::Generic(format!("Failed to encode query variables: {}", e)))?;

        pause(config.request_delay);
        info!("Fetching next timeline page of {}", profile.username);

        let body = self
            .session
            .http()
            .get(format!("{}/graphql/query/", config.base_url))
            .query(&[
                ("query_hash", config.posts_query_hash.as_str()),
                ("variables", variables.as_str()),
            ])
            .send()?
            .error_for_status()?
            .text()?;

        pages::next_page(&body)
    }
}

impl Iterator for Posts<'_> {
    type Item = Result<MediaRecord, AppError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.step() {
            Ok(record) => record.map(Ok),
            Err(e) => {
                self.pending.clear();
                self.state = WalkState::Failed;
                Some(Err(e))
            }
        }
    }
}

/// Sleep for a uniformly random interval within `delay`
fn pause(delay: DelayRange) {
    let min = delay.min().as_millis() as u64;
    let max = delay.max().as_millis() as u64;
    if max == 0 {
        return;
    }

    let millis = rand::thread_rng().gen_range(min..=max);
    debug!("Pausing {} ms before next request", millis);
    thread::sleep(Duration::from_millis(millis));
}
