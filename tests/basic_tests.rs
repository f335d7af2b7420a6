use object_browser::{
    adapters::outbound::export::HttpExportClient,
    create_in_memory_app, create_local_app,
    domain::{
        models::{ExportRoute, UploadOutcome},
        BucketId, ErrorKind, FolderPath, UploadEvent, UploadSource,
    },
    AppBuilder, ExportPipeline, ExportRequest, SelectionManager, UploadConfig,
};
use std::{sync::Arc, time::Duration};

fn bucket(id: &str) -> BucketId {
    BucketId::new(id).unwrap()
}

fn csv_sources(count: usize) -> Vec<UploadSource> {
    (0..count)
        .map(|i| {
            UploadSource::new(
                format!("sample-{}.csv", i),
                format!("id,value\n{},{}\n", i, i * 10),
            )
        })
        .collect()
}

#[tokio::test]
async fn uploads_respect_concurrency_limit_and_land_in_store() {
    let services = AppBuilder::new()
        .with_upload_config(UploadConfig {
            max_concurrent_uploads: 2,
            upload_timeout: Duration::from_secs(10),
            progress_interval: Duration::from_millis(10),
            ..UploadConfig::default()
        })
        .build()
        .await
        .unwrap();

    let research = bucket("research-datasets");
    let folder = FolderPath::parse("batch-01").unwrap();
    let mut events = services.uploads.subscribe();

    let ids = services
        .uploads
        .submit(&research, &folder, csv_sources(5))
        .unwrap();
    assert_eq!(ids.len(), 5);
    assert_eq!(services.uploads.uploading_count(), 2);
    assert_eq!(services.uploads.queued_count(), 3);

    services.uploads.wait_idle().await;

    for id in &ids {
        assert!(matches!(
            services.uploads.outcome(*id),
            Some(UploadOutcome::Completed { .. })
        ));
    }

    // Replay the event stream to check the cap was never exceeded
    let mut running = 0usize;
    let mut peak = 0usize;
    while let Ok(event) = events.try_recv() {
        match event {
            UploadEvent::Started { .. } => {
                running += 1;
                peak = peak.max(running);
            }
            UploadEvent::Completed { .. }
            | UploadEvent::Failed { .. }
            | UploadEvent::Cancelled { .. } => {
                running = running.saturating_sub(1);
            }
            _ => {}
        }
    }
    assert!(peak >= 1);
    assert!(peak <= 2);

    let view = services.store.list(&research, &folder).await.unwrap();
    assert_eq!(view.len(), 5);
    assert!(view.iter().all(|object| object.type_family.as_str() == "tabular"));
    let names: Vec<_> = view.iter().map(|object| object.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["sample-0.csv", "sample-1.csv", "sample-2.csv", "sample-3.csv", "sample-4.csv"]
    );

    let mut selection =
        SelectionManager::new(services.store.clone(), services.backend.clone(), view);
    selection.sync_with_store().await;
    assert!(selection.is_empty());
}

#[tokio::test]
async fn policy_violation_fails_without_touching_store() {
    let services = create_in_memory_app().await.unwrap();
    let images = bucket("medical-images");

    let ids = services
        .uploads
        .submit(
            &images,
            &FolderPath::root(),
            vec![UploadSource::new("payload.exe", vec![0u8; 16])],
        )
        .unwrap();
    services.uploads.wait_idle().await;

    match services.uploads.outcome(ids[0]) {
        Some(UploadOutcome::Failed { task }) => {
            assert_eq!(task.error_kind(), Some(ErrorKind::PolicyViolation));
        }
        other => panic!("expected failed outcome, got {:?}", other),
    }

    let view = services.store.list(&images, &FolderPath::root()).await.unwrap();
    assert!(view.is_empty());
}

#[tokio::test]
async fn bulk_delete_needs_confirmation_then_removes_everything() {
    let services = create_in_memory_app().await.unwrap();
    let research = bucket("research-datasets");
    let folder = FolderPath::parse("trial").unwrap();

    services
        .uploads
        .submit(&research, &folder, csv_sources(3))
        .unwrap();
    services.uploads.wait_idle().await;

    let view = services.store.list(&research, &folder).await.unwrap();
    let mut selection = SelectionManager::new(
        services.store.clone(),
        services.backend.clone(),
        view.clone(),
    )
    .with_threshold(services.delete_confirmation_threshold);
    selection.select_all(view);
    assert_eq!(selection.len(), 3);

    let refused = selection.bulk_delete(false).await.unwrap_err();
    assert_eq!(refused.kind(), ErrorKind::ConfirmationRequired);
    assert_eq!(services.store.list(&research, &folder).await.unwrap().len(), 3);

    assert_eq!(selection.bulk_delete(true).await.unwrap(), 3);
    assert!(selection.is_empty());
    assert!(services.store.list(&research, &folder).await.unwrap().is_empty());

    // Nothing selected is a no-op
    assert_eq!(selection.bulk_delete(false).await.unwrap(), 0);
}

#[tokio::test]
async fn reuploading_a_name_replaces_the_listed_object() {
    let services = create_in_memory_app().await.unwrap();
    let genomic = bucket("genomic-data");
    let folder = FolderPath::root();

    for body in ["##fileformat=VCFv4.2\n", "##fileformat=VCFv4.3\n#CHROM\n"] {
        services
            .uploads
            .submit(&genomic, &folder, vec![UploadSource::new("a.vcf", body)])
            .unwrap();
        services.uploads.wait_idle().await;
    }

    let view = services.store.list(&genomic, &folder).await.unwrap();
    assert_eq!(view.len(), 1);
    let backend_view = services
        .store
        .refresh(services.backend.as_ref(), &genomic, &folder)
        .await
        .unwrap();
    assert_eq!(backend_view.ids(), view.ids());

    let mut selection =
        SelectionManager::new(services.store.clone(), services.backend.clone(), view.clone());
    selection.select_all(view);
    assert_eq!(selection.bulk_delete(false).await.unwrap(), 1);
    assert!(services.store.list(&genomic, &folder).await.unwrap().is_empty());
}

#[tokio::test]
async fn local_backend_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let research = bucket("research-datasets");
    let folder = FolderPath::parse("cohort").unwrap();

    {
        let services = create_local_app(dir.path()).await.unwrap();
        services
            .uploads
            .submit(&research, &folder, csv_sources(2))
            .unwrap();
        services.uploads.wait_idle().await;
    }

    let services = create_local_app(dir.path()).await.unwrap();
    assert!(services.store.list(&research, &folder).await.unwrap().is_empty());

    let view = services
        .store
        .refresh(services.backend.as_ref(), &research, &folder)
        .await
        .unwrap();
    let mut names: Vec<_> = view.iter().map(|object| object.name.clone()).collect();
    names.sort();
    assert_eq!(names, vec!["sample-0.csv", "sample-1.csv"]);
}

#[tokio::test]
async fn export_falls_back_to_local_when_remote_is_unreachable() {
    let pipeline = ExportPipeline::builder()
        .remote(Arc::new(HttpExportClient::new(
            "http://127.0.0.1:9",
            Duration::from_secs(2),
        )))
        .timeout(Duration::from_secs(2))
        .build();

    let record = serde_json::json!({ "gene": "TP53", "variant": "c.215C>G", "genotype": "0/1" });
    let request = ExportRequest::builder()
        .subject_id("P-3")
        .section_key("variants_only")
        .format_key("spreadsheet")
        .records(vec![record.as_object().unwrap().clone()])
        .date(chrono::NaiveDate::from_ymd_opt(2024, 6, 30).unwrap())
        .build();

    let artifact = pipeline.export(&request).await.unwrap();
    assert_eq!(artifact.route, ExportRoute::Local);
    assert_eq!(artifact.filename, "P-3_variants_only_2024-06-30.xml");
    assert_eq!(artifact.mime_type, "application/vnd.ms-excel");
    assert!(String::from_utf8_lossy(&artifact.bytes).contains("TP53"));
}
