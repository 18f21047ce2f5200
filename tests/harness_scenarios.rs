//! ---
//! gse_section: "15-testing"
//! gse_subsection: "scenarios"
//! gse_type: "source"
//! gse_scope: "code"
//! gse_description: "Configuration-driven scenarios replaying recorded sessions."
//! gse_version: "v0.1.0"
//! gse_owner: "tbd"
//! ---
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use gse_common::{new_registry, HarnessConfig, HarnessMetrics};
use gse_msg::{replay_capture, InMemoryTransport, Transport};
use gse_testharness::{Category, Expected, Op, Selector, TestApi, Timeout, ANYTHING};

fn workspace_file(relative: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join(relative)
}

fn config_in(dir: &tempfile::TempDir) -> Result<PathBuf> {
    let path = dir.path().join("harness.toml");
    let dictionary = workspace_file("configs/dictionary.yaml");
    fs::write(
        &path,
        format!(
            "[wait]\ndefault_timeout_ms = 2000\npoll_interval_ms = 10\n\n[dictionary]\npath = {:?}\n",
            dictionary.display().to_string()
        ),
    )?;
    Ok(path)
}

#[tokio::test]
async fn replayed_session_satisfies_command_checks() -> Result<()> {
    gse_common::init_test();
    let dir = tempfile::tempdir()?;
    let config = HarnessConfig::load(&[config_in(&dir)?])?;
    let transport = InMemoryTransport::new();
    let link: Arc<dyn Transport> = Arc::new(transport.clone());
    let mut api = TestApi::from_config(link, &config)?;
    assert_eq!(api.default_timeout(), Duration::from_secs(2));

    let capture = workspace_file("tests/fixtures/no_op_session.ndjson");
    let replay = tokio::spawn({
        let transport = transport.clone();
        async move { replay_capture(&transport, capture).await }
    });

    api.wait_assert_evr_size(2, Some("OpCodeDispatched"), None, Timeout::Default)
        .await?;
    api.wait_assert_tlm_ge(2, Some("CommandsDispatched"), Selector::Any, Timeout::Default)
        .await?;
    api.assert_evr(
        Expected::list([Expected::from(1), ANYTHING]),
        Some("OpCodeDispatched"),
        Selector::At(0),
    )?;
    api.assert_evr_ne(
        Expected::list([Expected::from(1), ANYTHING]),
        Some("OpCodeDispatched"),
        Selector::At(1),
    )?;

    let error = api.wait_evr("OpCodeError", Timeout::Default).await?;
    assert!(error.found);
    assert_eq!(replay.await??, 6);
    api.assert_evr(
        Expected::list([Expected::from(2), Expected::from("bad argument")]),
        Some("OpCodeError"),
        Selector::All,
    )?;
    Ok(())
}

#[tokio::test]
async fn metrics_follow_the_session() -> Result<()> {
    gse_common::init_test();
    let registry = new_registry();
    let transport = InMemoryTransport::new();
    let dir = tempfile::tempdir()?;
    let config: HarnessConfig = fs::read_to_string(config_in(&dir)?)?.parse()?;
    let mut api = TestApi::from_config(Arc::new(transport.clone()), &config)?
        .with_metrics(HarnessMetrics::new(registry.clone())?);

    gse_msg::load_capture(&transport, workspace_file("tests/fixtures/no_op_session.ndjson"))?;
    api.wait_assert_size(Category::Event, 4, None, None, Op::Eq, Timeout::Immediate)
        .await?;
    let failed = api
        .wait_assert_tlm_size_gt(5, Some("CommandsDispatched"), None, Timeout::millis(30))
        .await
        .expect_err("only two samples exist");
    assert!(failed.as_assertion().is_some_and(|f| f.is_timeout()));

    let families = registry.gather();
    let drained = families
        .iter()
        .find(|family| family.get_name() == "gse_items_drained_total")
        .map(|family| family.get_metric()[0].get_counter().get_value());
    assert_eq!(drained, Some(6.0));
    Ok(())
}

#[test]
fn shipped_configuration_is_valid() -> Result<()> {
    let config = HarnessConfig::load(&[workspace_file("configs/harness.toml")])?;
    assert_eq!(config.wait.poll_interval, Duration::from_millis(100));
    assert_eq!(config.wait.default_timeout, Duration::from_secs(5));
    assert!(gse_msg::NameDirectory::load(workspace_file("configs/dictionary.yaml"))?
        .has_event("OpCodeCompleted"));
    Ok(())
}
