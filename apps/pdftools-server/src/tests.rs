//! Tests for the PDF tools server API
//!
//! The API tests drive the real router through `axum_test::TestServer`
//! over temporary storage, uploading generated PDFs and polling jobs to
//! their terminal state the way a client would.

#[cfg(test)]
mod property_tests {
    use proptest::prelude::*;

    use crate::api::sanitize_filename;

    proptest! {
        /// Property: a sanitized name can never break out of a quoted header value
        #[test]
        fn sanitized_names_are_header_safe(name in any::<String>()) {
            let clean = sanitize_filename(&name);
            prop_assert!(!clean.is_empty());
            prop_assert!(clean.chars().all(|c| c.is_ascii() && !c.is_ascii_control()));
            prop_assert!(!clean.contains('"'));
            prop_assert!(!clean.contains('\r') && !clean.contains('\n'));
        }

        /// Property: plain ASCII names pass through untouched
        #[test]
        fn plain_names_are_kept(name in "[a-zA-Z0-9_-]{1,30}\\.pdf") {
            prop_assert_eq!(sanitize_filename(&name), name);
        }
    }

    #[test]
    fn header_breaking_characters_are_removed() {
        assert_eq!(sanitize_filename("\"; rm -rf\r\n"), "; rm -rf");
        assert_eq!(sanitize_filename("a\\b\".pdf"), "ab.pdf");
        assert_eq!(sanitize_filename("\r\n\""), "download");
    }
}

#[cfg(test)]
mod api_tests {
    use std::time::Duration;

    use axum::http::StatusCode;
    use axum_test::multipart::{MultipartForm, Part};
    use axum_test::TestServer;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Dictionary, Document, Object, Stream, StringFormat};
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    use crate::config::ServerConfig;
    use crate::jobs::JobStatus;
    use crate::polling::{poll_until_terminal, JobView, PollingPolicy};
    use crate::registry::{FileStatus, NewFile};
    use crate::{build_router, AppState};

    fn create_test_server() -> (tempfile::TempDir, TestServer) {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ServerConfig::new(dir.path().join("uploads"), dir.path().join("processed"));
        config.workers = 2;
        config.poll_interval = Duration::from_millis(20);
        let app = build_router(AppState::new(config));
        (dir, TestServer::new(app).unwrap())
    }

    /// A PDF with `pages` pages, each showing "Page N".
    fn test_pdf(pages: u32) -> Vec<u8> {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids = Vec::new();
        for n in 1..=pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec![Object::Name(b"F1".to_vec()), Object::Integer(24)]),
                    Operation::new("Td", vec![Object::Integer(100), Object::Integer(700)]),
                    Operation::new(
                        "Tj",
                        vec![Object::String(format!("Page {}", n).into_bytes(), StringFormat::Literal)],
                    ),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id =
                doc.add_object(Stream::new(Dictionary::new(), content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources_id,
                "MediaBox" => vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(612),
                    Object::Integer(792),
                ],
            });
            kids.push(Object::Reference(page_id));
        }

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => Object::Integer(pages as i64),
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut out = Vec::new();
        doc.save_to(&mut out).unwrap();
        out
    }

    async fn upload(server: &TestServer, files: Vec<(&str, &str, Vec<u8>)>) -> Vec<String> {
        let mut form = MultipartForm::new();
        for (name, mime, bytes) in files {
            form = form.add_part("files", Part::bytes(bytes).file_name(name).mime_type(mime));
        }
        let response = server.post("/api/upload").multipart(form).await;
        response.assert_status_ok();

        let json = response.json::<Value>();
        assert_eq!(json["success"], true);
        json["files"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f["id"].as_str().unwrap().to_string())
            .collect()
    }

    async fn upload_pdfs(server: &TestServer, page_counts: &[u32]) -> Vec<String> {
        let files = page_counts
            .iter()
            .enumerate()
            .map(|(i, &pages)| {
                let name: &str = if i == 0 { "first.pdf" } else { "second.pdf" };
                (name, "application/pdf", test_pdf(pages))
            })
            .collect();
        upload(server, files).await
    }

    async fn start_job(server: &TestServer, operation: &str, inputs: &[String], parameters: Value) -> String {
        let response = server
            .post("/api/process")
            .json(&json!({
                "operation": operation,
                "inputFiles": inputs,
                "parameters": parameters,
            }))
            .await;
        response.assert_status_ok();

        let json = response.json::<Value>();
        assert_eq!(json["status"], "pending");
        assert_eq!(json["progress"], 0);
        json["jobId"].as_str().unwrap().to_string()
    }

    async fn wait_for_job(server: &TestServer, job_id: &str) -> JobView {
        let url = format!("/api/jobs/{}", job_id);
        let url = url.as_str();
        poll_until_terminal(
            move || async move {
                let response = server.get(url).await;
                if response.status_code() == StatusCode::NOT_FOUND {
                    None
                } else {
                    Some(response.json::<JobView>())
                }
            },
            PollingPolicy::new(Duration::from_millis(20)),
            500,
        )
        .await
        .unwrap()
    }

    async fn run(server: &TestServer, operation: &str, inputs: &[String], parameters: Value) -> JobView {
        let job_id = start_job(server, operation, inputs, parameters).await;
        wait_for_job(server, &job_id).await
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (_dir, server) = create_test_server();
        let response = server.get("/health").await;
        response.assert_status_ok();

        let json = response.json::<Value>();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["service"], "pdftools-server");
    }

    #[tokio::test]
    async fn test_merge_job_produces_downloadable_output() {
        let (_dir, server) = create_test_server();
        let ids = upload_pdfs(&server, &[2, 1]).await;

        let job = run(&server, "merge-pdf", &ids, json!({})).await;
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, 100);
        assert!(job.completed_at.is_some());
        assert!(job.error_message.is_none());
        assert!(job.poll_after_ms.is_none());
        assert_eq!(job.output_files.len(), 1);

        let output = &job.output_files[0];
        assert_eq!(output.file_type, "application/pdf");
        assert_eq!(output.metadata["operation"], "merge-pdf");
        assert_eq!(output.metadata["jobId"], job.id.to_string());

        let response = server
            .get(&format!("/api/files/{}/download", output.id))
            .await;
        response.assert_status_ok();
        let disposition = response.header("content-disposition");
        assert!(disposition.to_str().unwrap().starts_with("attachment; filename="));

        let merged = Document::load_mem(response.as_bytes()).unwrap();
        assert_eq!(merged.get_pages().len(), 3);

        // Inputs are flagged once a job has consumed them
        let input = server.get(&format!("/api/files/{}", ids[0])).await;
        assert_eq!(input.json::<Value>()["status"], "processed");
    }

    #[tokio::test]
    async fn test_split_job_registers_every_page() {
        let (_dir, server) = create_test_server();
        let ids = upload_pdfs(&server, &[3]).await;

        let job = run(&server, "split-pdf", &ids, json!({})).await;
        assert_eq!(job.status, JobStatus::Completed);
        let mut names: Vec<&str> = job
            .output_files
            .iter()
            .map(|f| f.original_name.as_str())
            .collect();
        names.sort();
        assert_eq!(names, vec!["page-1.pdf", "page-2.pdf", "page-3.pdf"]);
    }

    #[tokio::test]
    async fn test_unknown_operation_is_rejected() {
        let (_dir, server) = create_test_server();
        let ids = upload_pdfs(&server, &[1]).await;

        let response = server
            .post("/api/process")
            .json(&json!({ "operation": "shred-pdf", "inputFiles": ids }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let json = response.json::<Value>();
        assert_eq!(json["success"], false);
        assert_eq!(json["code"], "UNKNOWN_OPERATION");
        assert_eq!(json["error"], "Unsupported operation: shred-pdf");

        // No job was created
        let jobs = server.get("/api/jobs").await.json::<Vec<Value>>();
        assert!(jobs.is_empty());
    }

    #[tokio::test]
    async fn test_missing_file_is_rejected() {
        let (_dir, server) = create_test_server();
        let missing = uuid::Uuid::new_v4().to_string();

        let response = server
            .post("/api/process")
            .json(&json!({ "operation": "compress-pdf", "inputFiles": [missing] }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let json = response.json::<Value>();
        assert_eq!(json["code"], "FILE_NOT_FOUND");
        assert_eq!(json["error"], format!("File {} not found", missing));
    }

    #[tokio::test]
    async fn test_malformed_process_body() {
        let (_dir, server) = create_test_server();
        let response = server
            .post("/api/process")
            .json(&json!({ "inputFiles": [] }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["code"], "INVALID_REQUEST");
    }

    #[tokio::test]
    async fn test_protect_without_password_fails_without_outputs() {
        let (_dir, server) = create_test_server();
        let ids = upload_pdfs(&server, &[1]).await;

        let job = run(&server, "protect-pdf", &ids, json!({})).await;
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.progress, 0);
        assert!(job.output_files.is_empty());
        assert!(!job.error_message.unwrap_or_default().is_empty());

        // Only the upload is registered
        let files = server.get("/api/files").await.json::<Vec<Value>>();
        assert_eq!(files.len(), 1);
    }

    #[tokio::test]
    async fn test_compare_requires_two_files() {
        let (_dir, server) = create_test_server();
        let one = upload_pdfs(&server, &[1]).await;
        let job = run(&server, "compare-pdf", &one, json!({})).await;
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(
            job.error_message.as_deref(),
            Some("Compare PDF operation requires exactly two input files")
        );

        let mut three = upload_pdfs(&server, &[1, 2]).await;
        three.push(one[0].clone());
        let job = run(&server, "compare-pdf", &three, json!({})).await;
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.output_files.is_empty());

        let two = &three[..2];
        let job = run(&server, "compare-pdf", two, json!({})).await;
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.output_files.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_input_list_fails_job() {
        let (_dir, server) = create_test_server();
        let job = run(&server, "merge-pdf", &[], json!({})).await;
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.output_files.is_empty());
    }

    #[tokio::test]
    async fn test_redact_reports_limitations() {
        let (_dir, server) = create_test_server();
        let ids = upload_pdfs(&server, &[1]).await;

        let areas = json!({
            "areas": [{ "page": 1, "x": 90, "y": 690, "width": 150, "height": 40 }]
        });
        let job = run(&server, "redact-pdf", &ids, areas).await;
        assert_eq!(job.status, JobStatus::Completed);
        assert!(!job.notices.is_empty());

        let beyond = json!({
            "areas": [{ "page": 4, "x": 0, "y": 0, "width": 10, "height": 10 }]
        });
        let job = run(&server, "redact-pdf", &ids, beyond).await;
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job
            .error_message
            .unwrap_or_default()
            .contains("Page 4 does not exist in the PDF (total pages: 1)"));
    }

    #[tokio::test]
    async fn test_html_job_without_files() {
        let (_dir, server) = create_test_server();
        let job = run(
            &server,
            "html-to-pdf",
            &[],
            json!({ "htmlContent": "<h1>Report</h1><p>Quarterly numbers</p>" }),
        )
        .await;
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.output_files.len(), 1);
    }

    #[tokio::test]
    async fn test_progress_is_full_only_when_completed() {
        let (_dir, server) = create_test_server();
        let ids = upload_pdfs(&server, &[2]).await;

        let good = run(&server, "rotate-pdf", &ids, json!({ "degrees": 180 })).await;
        let bad = run(&server, "rotate-pdf", &ids, json!({ "degrees": 45 })).await;
        assert_eq!((good.status, good.progress), (JobStatus::Completed, 100));
        assert_eq!((bad.status, bad.progress), (JobStatus::Failed, 0));

        for job in server.get("/api/jobs").await.json::<Vec<JobView>>() {
            assert_eq!(job.progress == 100, job.status == JobStatus::Completed);
        }
    }

    #[tokio::test]
    async fn test_unknown_job_is_not_found() {
        let (_dir, server) = create_test_server();
        let response = server
            .get(&format!("/api/jobs/{}", uuid::Uuid::new_v4()))
            .await;
        response.assert_status(StatusCode::NOT_FOUND);
        assert_eq!(response.json::<Value>()["code"], "NOT_FOUND");

        server
            .get("/api/jobs/not-a-uuid")
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_delete_job() {
        let (_dir, server) = create_test_server();
        let ids = upload_pdfs(&server, &[1]).await;
        let job = run(&server, "compress-pdf", &ids, json!({})).await;

        let url = format!("/api/jobs/{}", job.id);
        server.delete(&url).await.assert_status_ok();
        server.get(&url).await.assert_status(StatusCode::NOT_FOUND);

        // Outputs outlive the job record
        let output = &job.output_files[0];
        server
            .get(&format!("/api/files/{}", output.id))
            .await
            .assert_status_ok();
    }

    #[tokio::test]
    async fn test_upload_rejects_disallowed_type() {
        let (_dir, server) = create_test_server();
        let form = MultipartForm::new().add_part(
            "files",
            Part::bytes(b"MZ".to_vec())
                .file_name("setup.exe")
                .mime_type("application/x-msdownload"),
        );
        let response = server.post("/api/upload").multipart(form).await;
        response.assert_status(StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(response.json::<Value>()["code"], "UNSUPPORTED_MEDIA_TYPE");

        let files = server.get("/api/files").await.json::<Vec<Value>>();
        assert!(files.is_empty());
    }

    #[tokio::test]
    async fn test_upload_limits() {
        let (_dir, server) = create_test_server();

        let mut form = MultipartForm::new();
        for i in 0..11 {
            form = form.add_part(
                "files",
                Part::bytes(test_pdf(1))
                    .file_name(format!("{}.pdf", i))
                    .mime_type("application/pdf"),
            );
        }
        let response = server.post("/api/upload").multipart(form).await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let empty = MultipartForm::new().add_text("note", "nothing attached");
        let response = server.post("/api/upload").multipart(empty).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["error"], "Invalid request: No files uploaded");

        let files = server.get("/api/files").await.json::<Vec<Value>>();
        assert!(files.is_empty());
    }

    #[tokio::test]
    async fn test_delete_file() {
        let (_dir, server) = create_test_server();
        let ids = upload_pdfs(&server, &[1]).await;
        let url = format!("/api/files/{}", ids[0]);

        let response = server.delete(&url).await;
        response.assert_status_ok();
        assert_eq!(response.json::<Value>()["success"], true);
        server.get(&url).await.assert_status(StatusCode::NOT_FOUND);
        server.delete(&url).await.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_download_when_bytes_are_gone() {
        let (_dir, server) = create_test_server();
        let ids = upload_pdfs(&server, &[1]).await;

        let record = server
            .get(&format!("/api/files/{}", ids[0]))
            .await
            .json::<Value>();
        std::fs::remove_file(record["storagePath"].as_str().unwrap()).unwrap();

        let response = server
            .get(&format!("/api/files/{}/download", ids[0]))
            .await;
        response.assert_status(StatusCode::NOT_FOUND);
        assert_eq!(response.json::<Value>()["error"], "File not found on disk");
    }

    #[tokio::test]
    async fn test_download_header_with_hostile_name() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig::new(dir.path().join("uploads"), dir.path().join("processed"));
        let state = AppState::new(config);
        let server = TestServer::new(build_router(state.clone())).unwrap();

        // Registered directly so the name reaches the registry byte for byte
        let stored = state
            .registry
            .storage()
            .save_upload("report.pdf", &test_pdf(1))
            .await
            .unwrap();
        let record = state.registry.create(NewFile {
            original_name: "\"; rm -rf\r\n".to_string(),
            file_type: "application/pdf".to_string(),
            stored,
            status: FileStatus::Uploaded,
            metadata: json!({}),
        });

        let response = server
            .get(&format!("/api/files/{}/download", record.id))
            .await;
        response.assert_status_ok();
        assert_eq!(
            response.header("content-disposition").to_str().unwrap(),
            "attachment; filename=\"; rm -rf\""
        );
        assert_eq!(
            response.header("content-type").to_str().unwrap(),
            "application/pdf"
        );
    }

    #[tokio::test]
    async fn test_operation_catalog() {
        let (_dir, server) = create_test_server();
        let ops = server.get("/api/operations").await.json::<Vec<Value>>();
        assert_eq!(ops.len(), 27);

        let compare = ops.iter().find(|o| o["id"] == "compare-pdf").unwrap();
        assert_eq!(compare["title"], "Compare PDF");
        assert_eq!(compare["minInputs"], 2);
        assert_eq!(compare["maxInputs"], 2);

        let merge = ops.iter().find(|o| o["id"] == "merge-pdf").unwrap();
        assert_eq!(merge["minInputs"], 1);
        assert!(merge.get("maxInputs").is_none());

        let html = ops.iter().find(|o| o["id"] == "html-to-pdf").unwrap();
        assert_eq!(html["minInputs"], 0);
    }

    #[tokio::test]
    async fn test_concurrent_jobs_on_shared_input() {
        let (_dir, server) = create_test_server();
        let ids = upload_pdfs(&server, &[2]).await;

        let mut job_ids = Vec::new();
        for _ in 0..6 {
            job_ids.push(start_job(&server, "compress-pdf", &ids, json!({})).await);
        }
        for job_id in &job_ids {
            let job = wait_for_job(&server, job_id).await;
            assert_eq!(job.status, JobStatus::Completed);
            assert_eq!(job.output_files.len(), 1);
        }

        let files = server.get("/api/files").await.json::<Vec<Value>>();
        assert_eq!(files.len(), 7);
    }
}
