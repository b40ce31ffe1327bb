//! State-machine tests for the package/activity upsert, driven entirely by
//! mocks: no network, no filesystem, no console.

use std::path::PathBuf;

use mockall::Sequence;

use dwg_provision::bundle::MockBundleBuilder;
use dwg_provision::client::MockDesignAutomation;
use dwg_provision::config::Settings;
use dwg_provision::error::ProvisionError;
use dwg_provision::models::{AppPackage, UploadedBundle};
use dwg_provision::prompt::MockPrompter;
use dwg_provision::provision::{
    provision, provision_activity, provision_package, ResourceOutcome,
};

const UPLOAD_URL: &str = "https://uploads.example/slot-1";

fn existing_package() -> AppPackage {
    AppPackage {
        id: "QueryDWGPackage".to_string(),
        required_engine_version: "21.0".to_string(),
        resource: "https://uploads.example/old-content".to_string(),
    }
}

fn silent_prompter() -> MockPrompter {
    let mut prompter = MockPrompter::new();
    prompter.expect_resolve().times(0);
    prompter
}

fn working_builder() -> MockBundleBuilder {
    let mut builder = MockBundleBuilder::new();
    builder
        .expect_build()
        .returning(|| Ok(PathBuf::from("package.zip")));
    builder
}

fn expect_upload(api: &mut MockDesignAutomation) {
    api.expect_upload_url()
        .times(1)
        .returning(|| Ok(UPLOAD_URL.to_string()));
    api.expect_upload_bundle()
        .times(1)
        .returning(|url, _| {
            Ok(UploadedBundle {
                url: url.to_string(),
            })
        });
}

#[tokio::test]
async fn absent_package_is_created_with_uploaded_resource() {
    let settings = Settings::default();
    let mut api = MockDesignAutomation::new();
    api.expect_find_package().times(1).returning(|_| Ok(None));
    expect_upload(&mut api);
    api.expect_stage_create_package()
        .times(1)
        .withf(|pkg| {
            pkg.id == "QueryDWGPackage"
                && pkg.required_engine_version == "21.0"
                && pkg.resource == UPLOAD_URL
        })
        .returning(|_| ());
    api.expect_stage_delete_package().times(0);
    api.expect_stage_update_package().times(0);
    api.expect_commit().times(1).returning(|| Ok(()));

    let result = provision_package(&api, &working_builder(), &silent_prompter(), &settings)
        .await
        .unwrap();
    assert_eq!(result.outcome, ResourceOutcome::Created);
    assert_eq!(result.entity.resource, UPLOAD_URL);
}

#[tokio::test]
async fn leave_returns_existing_package_untouched() {
    let settings = Settings::default();
    let mut api = MockDesignAutomation::new();
    api.expect_find_package()
        .times(1)
        .returning(|_| Ok(Some(existing_package())));
    // No delete, create, update, upload or commit may be issued.
    api.expect_stage_delete_package().times(0);
    api.expect_stage_create_package().times(0);
    api.expect_stage_update_package().times(0);
    api.expect_upload_url().times(0);
    api.expect_upload_bundle().times(0);
    api.expect_commit().times(0);

    let mut prompter = MockPrompter::new();
    prompter
        .expect_resolve()
        .times(1)
        .withf(|p| p.contains("[Recreate/Update/Leave]<Update>"))
        .returning(|_| Ok("Leave".to_string()));

    let mut builder = MockBundleBuilder::new();
    builder.expect_build().times(0);

    let result = provision_package(&api, &builder, &prompter, &settings)
        .await
        .unwrap();
    assert_eq!(result.outcome, ResourceOutcome::Left);
    assert_eq!(result.entity, existing_package());
}

#[tokio::test]
async fn recreate_deletes_and_commits_before_creating() {
    let settings = Settings::default();
    let mut api = MockDesignAutomation::new();
    let mut seq = Sequence::new();

    api.expect_find_package()
        .times(1)
        .returning(|_| Ok(Some(existing_package())));

    api.expect_stage_delete_package()
        .times(1)
        .in_sequence(&mut seq)
        .withf(|name| name == "QueryDWGPackage")
        .returning(|_| ());
    api.expect_commit()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|| Ok(()));

    expect_upload(&mut api);
    api.expect_stage_create_package()
        .times(1)
        .in_sequence(&mut seq)
        .withf(|pkg| pkg.resource == UPLOAD_URL)
        .returning(|_| ());
    api.expect_commit()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|| Ok(()));

    let mut prompter = MockPrompter::new();
    prompter
        .expect_resolve()
        .times(1)
        .returning(|_| Ok("Recreate".to_string()));

    let result = provision_package(&api, &working_builder(), &prompter, &settings)
        .await
        .unwrap();
    assert_eq!(result.outcome, ResourceOutcome::Created);
}

#[tokio::test]
async fn update_refreshes_only_the_resource_field() {
    let settings = Settings::default();
    let mut api = MockDesignAutomation::new();
    api.expect_find_package()
        .times(1)
        .returning(|_| Ok(Some(existing_package())));
    expect_upload(&mut api);
    api.expect_stage_delete_package().times(0);
    api.expect_stage_create_package().times(0);
    api.expect_stage_update_package()
        .times(1)
        .withf(|pkg| {
            let original = existing_package();
            pkg.resource == UPLOAD_URL
                && pkg.id == original.id
                && pkg.required_engine_version == original.required_engine_version
        })
        .returning(|_| ());
    api.expect_commit().times(1).returning(|| Ok(()));

    let mut prompter = MockPrompter::new();
    prompter
        .expect_resolve()
        .times(1)
        .returning(|_| Ok("Update".to_string()));

    let result = provision_package(&api, &working_builder(), &prompter, &settings)
        .await
        .unwrap();
    assert_eq!(result.outcome, ResourceOutcome::Updated);
    assert_eq!(result.entity.resource, UPLOAD_URL);
}

#[tokio::test]
async fn lookup_errors_abort_instead_of_driving_the_create_path() {
    let settings = Settings::default();
    let mut api = MockDesignAutomation::new();
    api.expect_find_package().times(1).returning(|_| {
        Err(ProvisionError::remote(
            "QueryDWGPackage",
            "lookup returned 503 Service Unavailable",
        ))
    });
    api.expect_upload_url().times(0);
    api.expect_stage_create_package().times(0);
    api.expect_commit().times(0);

    let mut builder = MockBundleBuilder::new();
    builder.expect_build().times(0);

    let err = provision_package(&api, &builder, &silent_prompter(), &settings)
        .await
        .unwrap_err();
    assert!(matches!(err, ProvisionError::RemoteCall { .. }));
}

#[tokio::test]
async fn failed_build_aborts_before_any_upload() {
    let settings = Settings::default();
    let mut api = MockDesignAutomation::new();
    api.expect_find_package().times(1).returning(|_| Ok(None));
    api.expect_upload_url().times(0);
    api.expect_upload_bundle().times(0);
    api.expect_commit().times(0);

    let mut builder = MockBundleBuilder::new();
    builder.expect_build().times(1).returning(|| {
        Err(ProvisionError::Precondition {
            resource: "QueryDWGPackage".to_string(),
            path: PathBuf::from("ArxApp.dll"),
        })
    });

    let err = provision_package(&api, &builder, &silent_prompter(), &settings)
        .await
        .unwrap_err();
    assert!(matches!(err, ProvisionError::Precondition { .. }));
}

#[tokio::test]
async fn absent_activity_is_created_with_fixed_contract() {
    let settings = Settings::default();
    let mut api = MockDesignAutomation::new();
    api.expect_find_activity().times(1).returning(|_| Ok(None));
    api.expect_stage_create_activity()
        .times(1)
        .withf(|activity| {
            let inputs: Vec<(&str, &str)> = activity
                .parameters
                .input_parameters
                .iter()
                .map(|p| (p.name.as_str(), p.local_file_name.as_str()))
                .collect();
            let outputs: Vec<(&str, &str)> = activity
                .parameters
                .output_parameters
                .iter()
                .map(|p| (p.name.as_str(), p.local_file_name.as_str()))
                .collect();
            inputs == vec![("HostDwg", "$(HostDwg)"), ("Params", "params.json")]
                && outputs == vec![("Results", "results.json")]
                && activity.app_packages == vec!["QueryDWGPackage".to_string()]
                && activity.instruction.script == "_querydwg params.json\n"
        })
        .returning(|_| ());
    api.expect_stage_delete_activity().times(0);
    api.expect_commit().times(1).returning(|| Ok(()));

    let result = provision_activity(&api, &silent_prompter(), &settings)
        .await
        .unwrap();
    assert_eq!(result.outcome, ResourceOutcome::Created);
}

#[tokio::test]
async fn declined_recreate_leaves_existing_activity() {
    let settings = Settings::default();
    let existing = dwg_provision::models::Activity::definition(&settings);
    let mut api = MockDesignAutomation::new();
    let returned = existing.clone();
    api.expect_find_activity()
        .times(1)
        .returning(move |_| Ok(Some(returned.clone())));
    api.expect_stage_delete_activity().times(0);
    api.expect_stage_create_activity().times(0);
    api.expect_commit().times(0);

    let mut prompter = MockPrompter::new();
    prompter
        .expect_resolve()
        .times(1)
        .withf(|p| p.contains("[Yes/No]<No>"))
        .returning(|_| Ok("No".to_string()));

    let result = provision_activity(&api, &prompter, &settings).await.unwrap();
    assert_eq!(result.outcome, ResourceOutcome::Left);
    assert_eq!(result.entity, existing);
}

#[tokio::test]
async fn accepted_recreate_deletes_activity_before_creating() {
    let settings = Settings::default();
    let mut api = MockDesignAutomation::new();
    let mut seq = Sequence::new();
    let existing = dwg_provision::models::Activity::definition(&settings);

    api.expect_find_activity()
        .times(1)
        .returning(move |_| Ok(Some(existing.clone())));
    api.expect_stage_delete_activity()
        .times(1)
        .in_sequence(&mut seq)
        .withf(|name| name == "QueryDWGActivity")
        .returning(|_| ());
    api.expect_commit()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|| Ok(()));
    api.expect_stage_create_activity()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| ());
    api.expect_commit()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|| Ok(()));

    let mut prompter = MockPrompter::new();
    prompter
        .expect_resolve()
        .times(1)
        .returning(|_| Ok("Yes".to_string()));

    let result = provision_activity(&api, &prompter, &settings).await.unwrap();
    assert_eq!(result.outcome, ResourceOutcome::Created);
}

#[tokio::test]
async fn fresh_run_creates_package_then_activity_with_two_commits() {
    let settings = Settings::default();
    let mut api = MockDesignAutomation::new();
    api.expect_find_package().times(1).returning(|_| Ok(None));
    api.expect_find_activity().times(1).returning(|_| Ok(None));
    expect_upload(&mut api);
    api.expect_stage_create_package().times(1).returning(|_| ());
    api.expect_stage_create_activity().times(1).returning(|_| ());
    api.expect_stage_delete_package().times(0);
    api.expect_stage_delete_activity().times(0);
    api.expect_stage_update_package().times(0);
    api.expect_commit().times(2).returning(|| Ok(()));

    let report = provision(&api, &working_builder(), &silent_prompter(), &settings)
        .await
        .unwrap();
    assert_eq!(report.package.outcome, ResourceOutcome::Created);
    assert_eq!(report.activity.outcome, ResourceOutcome::Created);
    assert_eq!(report.activity.entity.app_packages, vec![report.package.entity.id.clone()]);
}

#[tokio::test]
async fn failed_commit_surfaces_the_failing_resource() {
    let settings = Settings::default();
    let mut api = MockDesignAutomation::new();
    api.expect_find_package().times(1).returning(|_| Ok(None));
    expect_upload(&mut api);
    api.expect_stage_create_package().times(1).returning(|_| ());
    api.expect_commit().times(1).returning(|| {
        Err(ProvisionError::remote(
            "QueryDWGPackage",
            "save returned 400 Bad Request",
        ))
    });

    let err = provision_package(&api, &working_builder(), &silent_prompter(), &settings)
        .await
        .unwrap_err();
    match err {
        ProvisionError::RemoteCall { resource, .. } => assert_eq!(resource, "QueryDWGPackage"),
        other => panic!("expected RemoteCall error, got {other:?}"),
    }
}
