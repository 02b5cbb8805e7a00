use crate::auth::demo_auth::demo_users;
use crate::auth::models::AuthenticatedUser;
use crate::db::models::{CreateDocumentRequest, DocumentPatch};
use crate::error::AppError;
use crate::store::DocumentStore;

/// Page seeded for a demo user: title, icon, embedded content, children.
struct DemoPage {
    title: &'static str,
    icon: &'static str,
    content: &'static str,
    published: bool,
    children: &'static [DemoPage],
}

const WELCOME_TREE: DemoPage = DemoPage {
    title: "Welcome to Jotion",
    icon: "👋",
    content: include_str!("../demo_data/welcome.md"),
    published: true,
    children: &[
        DemoPage {
            title: "Getting started",
            icon: "🚀",
            content: include_str!("../demo_data/getting_started.md"),
            published: false,
            children: &[DemoPage {
                title: "Search",
                icon: "🔎",
                content: include_str!("../demo_data/search.md"),
                published: false,
                children: &[],
            }],
        },
    ],
};

/// Seed the welcome tree for every demo user who owns no documents yet.
///
/// Returns the number of documents created.
pub async fn seed_demo_data(store: &DocumentStore) -> Result<usize, AppError> {
    tracing::info!("Starting demo data seeding...");

    let mut created = 0;
    for user in demo_users() {
        let has_active = !store.get_search(Some(&user)).await?.is_empty();
        let has_archived = !store.get_trash(Some(&user)).await?.is_empty();
        if has_active || has_archived {
            tracing::info!(user_id = %user.user_id, "Demo user already has documents, skipping.");
            continue;
        }

        created += seed_page(store, &user, &WELCOME_TREE, None).await?;
    }

    tracing::info!(created, "Demo data seeding completed.");
    Ok(created)
}

async fn seed_page(
    store: &DocumentStore,
    user: &AuthenticatedUser,
    root: &DemoPage,
    parent: Option<String>,
) -> Result<usize, AppError> {
    // (page, parent id) pairs still to create, parents before children
    let mut pending = vec![(root, parent)];
    let mut created = 0;

    while let Some((page, parent_document)) = pending.pop() {
        let doc = store
            .create(
                Some(user),
                CreateDocumentRequest {
                    title: page.title.to_string(),
                    parent_document,
                },
            )
            .await?;

        store
            .update(
                Some(user),
                &doc.id,
                DocumentPatch {
                    content: Some(page.content.to_string()),
                    icon: Some(page.icon.to_string()),
                    is_published: Some(page.published),
                    ..DocumentPatch::default()
                },
            )
            .await?;
        created += 1;

        pending.extend(page.children.iter().map(|child| (child, Some(doc.id.clone()))));
    }

    Ok(created)
}
