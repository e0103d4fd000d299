//! Organization guard tests over the full router with fakes.

mod common;

use axum::http::StatusCode;
use serde_json::json;
use std::sync::atomic::Ordering;
use uuid::Uuid;

use authz_service::models::Role;
use common::{body_json, get, json_request, TestApp, GOOD_TOKEN};

#[tokio::test]
async fn member_can_read_but_not_administer() {
    let app = TestApp::new();
    let user = app.seed_user(false);
    let org = app.seed_org();
    app.store.add_membership(user.id, org.id, Role::Member);

    let read = app
        .request(get(&format!("/orgs/{}/members", org.id), Some(GOOD_TOKEN)))
        .await;
    assert_eq!(read.status(), StatusCode::OK);

    let write = app
        .request(json_request(
            "POST",
            &format!("/orgs/{}/members", org.id),
            GOOD_TOKEN,
            json!({ "user_id": Uuid::new_v4().to_string(), "role": "member" }),
        ))
        .await;
    assert_eq!(write.status(), StatusCode::FORBIDDEN);

    let body = body_json(write).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "FORBIDDEN");
    assert_eq!(
        body["error"]["message"],
        "Insufficient permissions for this organization"
    );
}

#[tokio::test]
async fn readonly_membership_satisfies_readonly_routes_only() {
    let app = TestApp::new();
    let user = app.seed_user(false);
    let org = app.seed_org();
    app.store.add_membership(user.id, org.id, Role::Readonly);

    let org_view = app
        .request(get(&format!("/orgs/{}", org.id), Some(GOOD_TOKEN)))
        .await;
    assert_eq!(org_view.status(), StatusCode::OK);

    let members = app
        .request(get(&format!("/orgs/{}/members", org.id), Some(GOOD_TOKEN)))
        .await;
    assert_eq!(members.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn non_member_denial_and_absent_org_differ_in_status() {
    let app = TestApp::new();
    app.seed_user(false);
    let org = app.seed_org();

    // Org exists, caller has no membership: 403.
    let denied = app
        .request(get(&format!("/orgs/{}", org.id), Some(GOOD_TOKEN)))
        .await;
    assert_eq!(denied.status(), StatusCode::FORBIDDEN);

    // Org does not exist: 404.
    let absent = app
        .request(get(&format!("/orgs/{}", Uuid::new_v4()), Some(GOOD_TOKEN)))
        .await;
    assert_eq!(absent.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deactivated_organization_reads_as_absent() {
    let app = TestApp::new();
    let user = app.seed_user(false);
    let mut org = app.seed_org();
    org.is_active = false;
    app.store.add_organization(org.clone());
    app.store.add_membership(user.id, org.id, Role::Owner);

    let response = app
        .request(get(&format!("/orgs/{}", org.id), Some(GOOD_TOKEN)))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn non_uuid_org_reference_is_a_400() {
    let app = TestApp::new();
    app.seed_user(false);

    let response = app
        .request(get("/orgs/not-a-uuid", Some(GOOD_TOKEN)))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn super_admin_bypasses_membership_without_a_lookup() {
    let app = TestApp::new();
    app.seed_user(true);
    let org = app.seed_org();

    let before = app.store.access_calls.load(Ordering::SeqCst);
    let response = app
        .request(get(&format!("/orgs/{}", org.id), Some(GOOD_TOKEN)))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.store.access_calls.load(Ordering::SeqCst), before);
}

#[tokio::test]
async fn global_role_never_substitutes_for_membership() {
    let app = TestApp::new();
    let mut user = app.seed_user(false);
    // A privileged global role without is_super_admin gets no bypass.
    user.role = "admin".to_string();
    app.store.add_user(user);
    let org = app.seed_org();

    let response = app
        .request(get(&format!("/orgs/{}", org.id), Some(GOOD_TOKEN)))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn store_failure_fails_closed_with_a_500() {
    let app = TestApp::new();
    let user = app.seed_user(false);
    let org = app.seed_org();
    app.store.add_membership(user.id, org.id, Role::Owner);

    app.store.set_failing(true);

    let response = app
        .request(get(&format!("/orgs/{}", org.id), Some(GOOD_TOKEN)))
        .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "INTERNAL_ERROR");
}

#[tokio::test]
async fn path_org_id_wins_over_body_org_id() {
    let app = TestApp::new();
    let user = app.seed_user(false);
    let org_member = app.seed_org();
    let org_admin = app.seed_org();
    app.store.add_membership(user.id, org_member.id, Role::Member);
    app.store.add_membership(user.id, org_admin.id, Role::Admin);

    // Path names the member-role org; body names the admin-role org. The
    // admin-gated route must deny on the path org.
    let response = app
        .request(json_request(
            "POST",
            &format!("/orgs/{}/members", org_member.id),
            GOOD_TOKEN,
            json!({
                "organizationId": org_admin.id.to_string(),
                "user_id": Uuid::new_v4().to_string(),
                "role": "member",
            }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_grants_and_owner_ceiling() {
    let app = TestApp::new();
    let admin = app.seed_user(false);
    let org = app.seed_org();
    app.store.add_membership(admin.id, org.id, Role::Admin);

    let target = {
        let mut u = admin.clone();
        u.id = Uuid::new_v4();
        u.email = "target@example.com".to_string();
        u
    };
    app.store.add_user(target.clone());

    // Admin grants a member role: allowed.
    let grant = app
        .request(json_request(
            "POST",
            &format!("/orgs/{}/members", org.id),
            GOOD_TOKEN,
            json!({ "user_id": target.id.to_string(), "role": "member" }),
        ))
        .await;
    assert_eq!(grant.status(), StatusCode::CREATED);

    // Admin grants owner: above their own rank, denied.
    let escalate = app
        .request(json_request(
            "POST",
            &format!("/orgs/{}/members", org.id),
            GOOD_TOKEN,
            json!({ "user_id": target.id.to_string(), "role": "owner" }),
        ))
        .await;
    assert_eq!(escalate.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn removing_a_member_deactivates_their_access() {
    let app = TestApp::new();
    let admin = app.seed_user(false);
    let org = app.seed_org();
    app.store.add_membership(admin.id, org.id, Role::Admin);

    let target_id = Uuid::new_v4();
    let mut target = admin.clone();
    target.id = target_id;
    target.email = "member@example.com".to_string();
    app.store.add_user(target);
    app.store.add_membership(target_id, org.id, Role::Member);

    let remove = app
        .request(json_request(
            "DELETE",
            &format!("/orgs/{}/members/{}", org.id, target_id),
            GOOD_TOKEN,
            json!({}),
        ))
        .await;
    assert_eq!(remove.status(), StatusCode::NO_CONTENT);

    // Removing again: no active row, 404.
    let again = app
        .request(json_request(
            "DELETE",
            &format!("/orgs/{}/members/{}", org.id, target_id),
            GOOD_TOKEN,
            json!({}),
        ))
        .await;
    assert_eq!(again.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn creating_an_organization_makes_the_caller_its_owner() {
    let app = TestApp::new();
    let user = app.seed_user(false);

    let created = app
        .request(json_request(
            "POST",
            "/orgs",
            GOOD_TOKEN,
            json!({ "name": "Acme" }),
        ))
        .await;
    assert_eq!(created.status(), StatusCode::CREATED);
    let body = body_json(created).await;
    let org_id = body["id"].as_str().unwrap().to_string();

    // The creator can immediately administer the new org.
    let members = app
        .request(get(&format!("/orgs/{}/members", org_id), Some(GOOD_TOKEN)))
        .await;
    assert_eq!(members.status(), StatusCode::OK);
    let listing = body_json(members).await;
    assert_eq!(listing["total"], 1);
    assert_eq!(listing["members"][0]["user_id"], user.id.to_string());
    assert_eq!(listing["members"][0]["role"], "owner");
}
