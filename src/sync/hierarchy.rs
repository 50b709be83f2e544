//! Category hierarchy resolution.
//!
//! The storefront only accepts a parent that already exists there, while
//! the ERP hands categories over in no particular order. Nodes whose parent
//! is not yet known are deferred and retried in the next pass, until a pass
//! makes no progress or the pass limit is reached.

use sqlx::SqlitePool;
use std::collections::{HashMap, HashSet};

use super::{RunOptions, SyncError, SyncReport};
use crate::clients::{CategoryPayload, ClientError, RemoteCategory, StoreApi};
use crate::db::CategoryRepository;
use crate::mapping::slugify;
use crate::models::{Category, SyncStatus};

enum NodeOutcome {
    Done,
    Deferred { parent_ten_id: i64 },
}

/// How a slug search settled on a storefront category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Choice {
    /// Same slug under the expected parent.
    Scoped(i64),
    /// Same slug elsewhere; `candidates` counts every live match.
    Unscoped { id: i64, candidates: usize },
}

impl Choice {
    fn id(self) -> i64 {
        match self {
            Choice::Scoped(id) | Choice::Unscoped { id, .. } => id,
        }
    }
}

fn choose(candidates: &[RemoteCategory], parent: i64) -> Option<Choice> {
    let live: Vec<&RemoteCategory> = candidates.iter().filter(|c| c.id > 0).collect();
    if parent >= 0 {
        if let Some(hit) = live.iter().find(|c| c.parent == parent) {
            return Some(Choice::Scoped(hit.id));
        }
    }
    live.first().map(|first| Choice::Unscoped {
        id: first.id,
        candidates: live.len(),
    })
}

/// Resolves and pushes one selection of categories.
pub struct HierarchyResolver<'a> {
    repo: CategoryRepository,
    store: &'a dyn StoreApi,
    options: &'a RunOptions,
    /// ERP id -> storefront id, seeded from the store.
    resolved: HashMap<i64, i64>,
    /// (slug, storefront parent) -> storefront id, filled during the run.
    by_slug_and_parent: HashMap<(String, i64), i64>,
    /// Storefront search results by slug.
    remote_by_slug: HashMap<String, Vec<RemoteCategory>>,
    /// Parents linked while resolving a child; each counts once.
    linked_inline: HashSet<i64>,
    next_placeholder: i64,
    passes: usize,
    report: SyncReport,
}

impl<'a> HierarchyResolver<'a> {
    pub fn new(repo: CategoryRepository, store: &'a dyn StoreApi, options: &'a RunOptions) -> Self {
        Self {
            repo,
            store,
            options,
            resolved: HashMap::new(),
            by_slug_and_parent: HashMap::new(),
            remote_by_slug: HashMap::new(),
            linked_inline: HashSet::new(),
            next_placeholder: -1,
            passes: 0,
            report: SyncReport::default(),
        }
    }

    /// Passes used by the last run.
    pub fn passes(&self) -> usize {
        self.passes
    }

    pub async fn run(&mut self, nodes: Vec<Category>) -> Result<SyncReport, SyncError> {
        self.resolved = self.repo.linked_ids().await?;
        self.report = SyncReport {
            fetched: nodes.len(),
            ..Default::default()
        };
        self.passes = 0;
        self.linked_inline.clear();

        let mut pending: Vec<(Category, i64)> = nodes.into_iter().map(|n| (n, 0)).collect();
        while !pending.is_empty() && self.passes < self.options.max_passes {
            self.passes += 1;
            let before = pending.len();
            let mut deferred = Vec::new();

            for (node, _) in pending {
                match self.process(&node).await? {
                    NodeOutcome::Done => {}
                    NodeOutcome::Deferred { parent_ten_id } => deferred.push((node, parent_ten_id)),
                }
            }

            tracing::debug!(
                pass = self.passes,
                processed = before,
                deferred = deferred.len(),
                "hierarchy pass finished"
            );
            let stalled = deferred.len() == before;
            pending = deferred;
            if stalled {
                break;
            }
        }

        for (node, parent_ten_id) in &pending {
            tracing::warn!(
                ten_id = node.ten_id,
                parent_ten_id,
                passes = self.passes,
                "category parent unresolved, skipping until a later run"
            );
        }
        self.report.skipped_unresolved = pending.len();

        Ok(self.report.clone())
    }

    async fn process(&mut self, node: &Category) -> Result<NodeOutcome, SyncError> {
        if self.linked_inline.contains(&node.ten_id) {
            return Ok(NodeOutcome::Done);
        }
        let name = node.display_name();
        let slug = slugify(&name);

        if node.ten_id <= 0 {
            self.fail(node, "category has no ERP id").await?;
            return Ok(NodeOutcome::Done);
        }
        if slug.is_empty() {
            self.fail(node, "category has no usable name").await?;
            return Ok(NodeOutcome::Done);
        }
        if node.parent() == Some(node.ten_id) {
            self.fail(node, "category is its own parent").await?;
            return Ok(NodeOutcome::Done);
        }

        let parent = match self.resolve_parent(node).await {
            Ok(Some(parent)) => parent,
            Ok(None) => {
                return Ok(NodeOutcome::Deferred {
                    parent_ten_id: node.parent().unwrap_or(0),
                })
            }
            Err(SyncError::Client(e)) => {
                self.fail(node, &e.to_string()).await?;
                return Ok(NodeOutcome::Done);
            }
            Err(e) => return Err(e),
        };

        let payload = CategoryPayload {
            name,
            slug: slug.clone(),
            parent: parent.max(0),
        };
        if let Err(e) = self.resolve_node(node, &payload, parent).await {
            match e {
                SyncError::Client(e) => self.fail(node, &e.to_string()).await?,
                other => return Err(other),
            }
        }
        Ok(NodeOutcome::Done)
    }

    /// Storefront id of the node's parent, 0 for roots, `None` to defer.
    async fn resolve_parent(&mut self, node: &Category) -> Result<Option<i64>, SyncError> {
        let Some(parent_ten_id) = node.parent() else {
            return Ok(Some(0));
        };
        if let Some(id) = self.resolved.get(&parent_ten_id) {
            return Ok(Some(*id));
        }

        let Some(parent) = self.repo.get(parent_ten_id).await? else {
            return Ok(None);
        };
        if let Some(id) = parent.woo_id {
            self.resolved.insert(parent_ten_id, id);
            return Ok(Some(id));
        }

        // only categories that are themselves eligible may be linked here
        if parent.blocked || parent.sync_status == SyncStatus::Disabled {
            tracing::debug!(
                ten_id = node.ten_id,
                parent_ten_id,
                status = %parent.sync_status,
                blocked = parent.blocked,
                "parent category excluded from sync, deferring"
            );
            return Ok(None);
        }

        let parent_slug = slugify(&parent.display_name());
        if parent_slug.is_empty() {
            return Ok(None);
        }
        let grandparent = match parent.parent() {
            None => 0,
            Some(id) => match self.resolved.get(&id) {
                Some(woo_id) if *woo_id >= 0 => *woo_id,
                _ => return Ok(None),
            },
        };

        let Some(found) = self.find_scoped(&parent_slug, grandparent).await? else {
            return Ok(None);
        };
        let payload = CategoryPayload {
            name: parent.display_name(),
            slug: parent_slug.clone(),
            parent: grandparent,
        };
        if let Err(e) = self.push_update(&parent, &payload, found, grandparent).await {
            match e {
                SyncError::Client(e) => {
                    tracing::warn!(
                        ten_id = parent_ten_id,
                        woo_id = found,
                        error = %e,
                        "inline parent link failed, deferring child"
                    );
                    return Ok(None);
                }
                other => return Err(other),
            }
        }
        tracing::info!(
            ten_id = parent_ten_id,
            woo_id = found,
            slug = %parent_slug,
            "linked parent category found in storefront"
        );
        self.linked_inline.insert(parent_ten_id);
        self.report.linked += 1;
        Ok(Some(found))
    }

    async fn resolve_node(
        &mut self,
        node: &Category,
        payload: &CategoryPayload,
        parent: i64,
    ) -> Result<(), SyncError> {
        let known = node
            .woo_id
            .or_else(|| self.resolved.get(&node.ten_id).copied());

        if let Some(id) = known {
            // placeholder from an earlier pass of this dry run
            if id < 0 {
                return Ok(());
            }
            self.push_update(node, payload, id, parent).await?;
            self.report.updated += 1;
            return Ok(());
        }

        if let Some(id) = self.find_remote(&payload.slug, parent).await? {
            tracing::info!(ten_id = node.ten_id, woo_id = id, slug = %payload.slug, "linking category");
            self.push_update(node, payload, id, parent).await?;
            self.report.linked += 1;
            return Ok(());
        }

        let id = if self.options.dry_run {
            let id = self.next_placeholder;
            self.next_placeholder -= 1;
            id
        } else {
            let created = self.store.create_category(payload).await?;
            if created.id <= 0 {
                return Err(ClientError::shape(
                    "products/categories",
                    "created category has no id",
                )
                .into());
            }
            self.repo
                .mark_synced(node.ten_id, created.id, Some(parent))
                .await?;
            created.id
        };
        tracing::info!(ten_id = node.ten_id, woo_id = id, slug = %payload.slug, parent, "category created");
        self.remember(node.ten_id, &payload.slug, parent, id);
        self.report.created += 1;
        Ok(())
    }

    async fn push_update(
        &mut self,
        node: &Category,
        payload: &CategoryPayload,
        id: i64,
        parent: i64,
    ) -> Result<(), SyncError> {
        if !self.options.dry_run {
            self.store.update_category(id, payload).await?;
            self.repo.mark_synced(node.ten_id, id, Some(parent)).await?;
        }
        self.remember(node.ten_id, &payload.slug, parent, id);
        Ok(())
    }

    /// Parent-scoped match first; an unscoped match only as a last resort.
    async fn find_remote(&mut self, slug: &str, parent: i64) -> Result<Option<i64>, ClientError> {
        if let Some(id) = self.by_slug_and_parent.get(&(slug.to_string(), parent)) {
            return Ok(Some(*id));
        }

        let candidates = self.remote_candidates(slug).await?;
        let choice = choose(&candidates, parent);
        match choice {
            Some(Choice::Unscoped { id, candidates }) if candidates > 1 => tracing::warn!(
                slug,
                parent,
                candidates,
                chosen = id,
                "ambiguous category slug, linking the first candidate"
            ),
            Some(Choice::Unscoped { id, .. }) => {
                tracing::info!(slug, parent, woo_id = id, "category matched by slug only")
            }
            _ => {}
        }
        Ok(choice.map(Choice::id))
    }

    /// Same slug under `parent` only.
    async fn find_scoped(&mut self, slug: &str, parent: i64) -> Result<Option<i64>, ClientError> {
        if let Some(id) = self.by_slug_and_parent.get(&(slug.to_string(), parent)) {
            return Ok(Some(*id));
        }
        let candidates = self.remote_candidates(slug).await?;
        Ok(match choose(&candidates, parent) {
            Some(Choice::Scoped(id)) => Some(id),
            _ => None,
        })
    }

    async fn remote_candidates(&mut self, slug: &str) -> Result<Vec<RemoteCategory>, ClientError> {
        if let Some(cached) = self.remote_by_slug.get(slug) {
            return Ok(cached.clone());
        }
        let found = self.store.categories_by_slug(slug).await?;
        self.remote_by_slug.insert(slug.to_string(), found.clone());
        Ok(found)
    }

    fn remember(&mut self, ten_id: i64, slug: &str, parent: i64, woo_id: i64) {
        self.resolved.insert(ten_id, woo_id);
        self.by_slug_and_parent
            .insert((slug.to_string(), parent), woo_id);
    }

    async fn fail(&mut self, node: &Category, message: &str) -> Result<(), SyncError> {
        tracing::error!(ten_id = node.ten_id, error = message, "category sync failed");
        self.report.errored += 1;
        if !self.options.dry_run {
            self.repo.mark_error(node.ten_id, message).await?;
        }
        Ok(())
    }
}

/// Pushes the selected categories to the storefront.
pub async fn sync_categories(
    pool: &SqlitePool,
    store: &dyn StoreApi,
    options: &RunOptions,
) -> Result<SyncReport, SyncError> {
    let repo = CategoryRepository::new(pool.clone());
    let nodes = repo.select_for_sync(options.filter, options.limit).await?;

    let mut resolver = HierarchyResolver::new(repo, store, options);
    let report = resolver.run(nodes).await?;
    tracing::info!(%report, passes = resolver.passes(), "categories synced");
    Ok(report)
}
