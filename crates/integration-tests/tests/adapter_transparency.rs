//! The same snippet yields the same decoded value and the same error kind
//! whether it runs in a local interpreter or through FastCGI.

#![cfg(unix)]

mod common;

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::json;

use cachetool_core::application::CacheTool;
use cachetool_core::domain::{Code, DecodedValue, ReturnConvention};
use cachetool_core::port::Adapter;
use cachetool_core::CacheToolError;
use cachetool_infra_fastcgi::{FastCgiAdapter, FastCgiConfig};
use cachetool_infra_system::{ProcessAdapter, ProcessConfig};

use common::{staged_files, Behaviour, StubServer};

/// Shell stand-in for php: prints `stdout` and `stderr`, exits with `code`
fn fake_php(dir: &Path, stdout: &str, stderr: &str, code: i32) -> PathBuf {
    let path = dir.join("php");
    let script = format!(
        "#!/bin/sh\nprintf '%s' '{}'\nprintf '%s' '{}' >&2\nexit {}\n",
        stdout, stderr, code
    );
    std::fs::write(&path, script).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn process_adapter(bin: PathBuf, staging: &Path) -> ProcessAdapter {
    ProcessAdapter::new(ProcessConfig {
        php_binary: bin,
        php_args: Vec::new(),
        timeout: Duration::from_secs(10),
        temp_dir: Some(staging.to_path_buf()),
    })
}

fn fastcgi_adapter(server: &StubServer, staging: &Path) -> FastCgiAdapter {
    let mut config = FastCgiConfig::new(server.endpoint().parse().unwrap());
    config.temp_dir = Some(staging.to_path_buf());
    FastCgiAdapter::new(config)
}

fn structured() -> Code {
    Code::call("apc_sma_info", &[json!(true)], ReturnConvention::Structured)
}

#[tokio::test]
async fn test_same_value_from_both_adapters() {
    let body = r#"{"num_seg":1,"seg_size":33554432}"#;
    let bin_dir = tempfile::tempdir().unwrap();
    let staging = tempfile::tempdir().unwrap();

    let mut local = process_adapter(fake_php(bin_dir.path(), body, "", 0), staging.path());
    let server = StubServer::tcp([Behaviour::ok(body)]).await;
    let mut remote = fastcgi_adapter(&server, staging.path());

    let from_local = local.run(structured()).await.unwrap();
    let from_remote = remote.run(structured()).await.unwrap();

    assert_eq!(from_local, from_remote);
    assert_eq!(
        from_local,
        DecodedValue::Structured(json!({"num_seg": 1, "seg_size": 33554432}))
    );
    assert_eq!(staged_files(staging.path()), 0);
}

#[tokio::test]
async fn test_same_error_kind_from_both_adapters() {
    let bin_dir = tempfile::tempdir().unwrap();
    let staging = tempfile::tempdir().unwrap();

    let mut local = process_adapter(fake_php(bin_dir.path(), "", "boom", 255), staging.path());
    let server = StubServer::tcp([Behaviour::failed(500, "boom")]).await;
    let mut remote = fastcgi_adapter(&server, staging.path());

    let from_local = local.run(structured()).await.unwrap_err();
    let from_remote = remote.run(structured()).await.unwrap_err();

    for err in [&from_local, &from_remote] {
        match err {
            CacheToolError::Execution { status, stderr, .. } => {
                assert_eq!(*status, 500);
                assert_eq!(stderr, "boom");
            }
            other => panic!("expected execution error, got {:?}", other),
        }
    }
    assert_eq!(staged_files(staging.path()), 0);
}

#[tokio::test]
async fn test_facade_over_process_adapter() {
    let bin_dir = tempfile::tempdir().unwrap();
    let staging = tempfile::tempdir().unwrap();
    let bin = fake_php(bin_dir.path(), "true", "", 0);
    let mut tool = CacheTool::new(Box::new(process_adapter(bin, staging.path())));

    let value = tool
        .call(
            "Zend OPcache",
            Code::call("opcache_reset", &[], ReturnConvention::Scalar),
        )
        .await
        .unwrap();

    assert_eq!(tool.adapter_name(), "cli");
    assert!(value.is_truthy());
    assert_eq!(staged_files(staging.path()), 0);
}

#[tokio::test]
async fn test_shape_mismatch_is_execution_error_on_both() {
    let bin_dir = tempfile::tempdir().unwrap();
    let staging = tempfile::tempdir().unwrap();

    let mut local = process_adapter(fake_php(bin_dir.path(), "42", "", 0), staging.path());
    let server = StubServer::tcp([Behaviour::ok("42")]).await;
    let mut remote = fastcgi_adapter(&server, staging.path());

    let from_local = local.run(structured()).await.unwrap_err();
    let from_remote = remote.run(structured()).await.unwrap_err();

    assert_eq!(from_local.kind(), "Execution");
    assert_eq!(from_remote.kind(), "Execution");
}
