use anyhow::Result;
use chrono::{Duration, Utc};

use crate::api::routes::{APPLICATION_DETAIL_VIEW, APPLICATION_LIST_VIEW};
use crate::logic::admin;
use crate::model::{AppVersion, EndpointRecord, WebVersion};
use crate::store::traits::Store;

/// Load a small demo graph: a retired first release, two live releases and a
/// fourth one waiting for the third to be deprecated.
pub async fn load_seed_data<S: Store + ?Sized>(store: &S) -> Result<()> {
    let now = Utc::now();

    let mut launch = WebVersion::new(1, "1.0.0", "Launch").deprecated_since(now - Duration::days(90));
    launch.added_feature = "First public website".to_string();

    let mut accounts = WebVersion::new(2, "2.0.0", "Accounts").with_previous([1]);
    accounts.added_feature = "User accounts and the application API".to_string();
    accounts.api_prefix = Some("/api".to_string());
    accounts.login_url = Some("/v2/login".to_string());
    accounts.register_url = Some("/v2/register".to_string());

    let mut orders = WebVersion::new(3, "3.0.0", "Orders")
        .with_previous([2])
        .with_api_prefix("/api");
    orders.added_feature = "Order tracking".to_string();

    let mut checkout = WebVersion::new(4, "4.0.0", "Checkout")
        .with_incompatible([3])
        .with_api_prefix("/api");
    checkout.added_feature = "New checkout flow, replaces the order API".to_string();

    for version in [launch, accounts, orders, checkout] {
        admin::upsert_version(store, version).await?;
    }
    log::info!("seeded 4 website versions");

    let endpoints = [
        EndpointRecord::new("home_v2", 2, false).with_view_url("/home"),
        EndpointRecord::new("home", 1, false)
            .with_view_url("/home")
            .superseded_by("home_v2"),
        EndpointRecord::new(APPLICATION_LIST_VIEW, 2, true).with_view_url("/v1/application"),
        EndpointRecord::new(APPLICATION_DETAIL_VIEW, 2, true).with_view_url("/v1/application/detail"),
        EndpointRecord::new("orders_next", 4, true).with_view_url("/orders"),
        EndpointRecord::new("orders", 3, true)
            .with_view_url("/orders")
            .superseded_by("orders_next"),
    ];
    let count = endpoints.len();
    for record in endpoints {
        admin::upsert_endpoint(store, record).await?;
    }
    log::info!("seeded {} views", count);

    let mut first_app = AppVersion::new(1, "1.0.0", "Mobile");
    first_app.attachment = Some("mobile-1.0.0.apk".to_string());
    first_app.base_dependency_web_version = Some(2);

    let mut second_app = AppVersion::new(2, "1.1.0", "Mobile");
    second_app.attachment = Some("mobile-1.1.0.apk".to_string());
    second_app.base = Some(1);
    second_app.base_dependency_web_version = Some(3);

    admin::upsert_app_version(store, first_app).await?;
    admin::upsert_app_version(store, second_app).await?;
    admin::set_required_endpoints(
        store,
        1,
        vec!["home_v2".to_string(), APPLICATION_LIST_VIEW.to_string()],
    )
    .await?;
    admin::set_required_endpoints(store, 2, vec!["orders".to_string()]).await?;
    log::info!("seeded 2 app versions");

    Ok(())
}
