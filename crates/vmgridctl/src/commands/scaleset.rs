//! `vmgridctl scaleset` — create, inspect, scale, and delete scale sets.

use std::path::Path;

use anyhow::Context as _;

use vmgrid_core::{ScaleSetDefinition, ScaleSetRecord, VirtualMachine};

use super::Context;

pub async fn create(ctx: &Context, file: &Path) -> anyhow::Result<ScaleSetRecord> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;
    let definition: ScaleSetDefinition = toml::from_str(&content)
        .with_context(|| format!("parsing {}", file.display()))?;
    Ok(ctx.orchestrator.create(&definition, ctx.options).await?)
}

pub fn get(ctx: &Context, name: Option<&str>) -> anyhow::Result<Vec<ScaleSetRecord>> {
    Ok(ctx.orchestrator.get(name.unwrap_or_default())?)
}

pub async fn scale(ctx: &Context, name: &str, capacity: u32) -> anyhow::Result<ScaleSetRecord> {
    Ok(ctx.orchestrator.scale(name, capacity, ctx.options).await?)
}

pub async fn delete(ctx: &Context, name: &str) -> anyhow::Result<()> {
    Ok(ctx.orchestrator.delete(name, ctx.options).await?)
}

pub async fn replicas(ctx: &Context, name: &str) -> anyhow::Result<Vec<VirtualMachine>> {
    Ok(ctx.orchestrator.replicas(name, ctx.options).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vmgrid_core::GridConfig;
    use vmgrid_state::StateStore;

    const DEFINITION: &str = r#"
name = "web"
capacity = 2

[profile]
name_prefix = "front"

[[profile.network.interfaces]]
network_name = "lan"

[profile.storage.os_disk]
name = "ubuntu-2404"

[profile.os]
computer_name = "web"

[profile.os.administrator]
username = "ops"
"#;

    fn context() -> Context {
        let store = StateStore::open_in_memory().unwrap();
        Context::with_store(&store, &GridConfig::default(), None).unwrap()
    }

    fn definition_file(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("web.toml");
        std::fs::write(&path, DEFINITION).unwrap();
        path
    }

    #[tokio::test]
    async fn full_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context();

        let created = create(&ctx, &definition_file(dir.path())).await.unwrap();
        assert_eq!(created.replicas.len(), 2);

        let scaled = scale(&ctx, "web", 3).await.unwrap();
        assert_eq!(scaled.capacity, 3);

        let vms = replicas(&ctx, "web").await.unwrap();
        assert_eq!(vms.len(), 3);

        assert_eq!(get(&ctx, None).unwrap().len(), 1);

        delete(&ctx, "web").await.unwrap();
        assert!(get(&ctx, Some("web")).is_err());
    }

    #[tokio::test]
    async fn create_reports_unreadable_file() {
        let ctx = context();
        let err = create(&ctx, Path::new("/nonexistent/web.toml")).await.unwrap_err();
        assert!(err.to_string().contains("/nonexistent/web.toml"));
    }

    #[test]
    fn timeout_flag_must_parse() {
        let store = StateStore::open_in_memory().unwrap();
        assert!(Context::with_store(&store, &GridConfig::default(), Some("soon")).is_err());
        let ctx = Context::with_store(&store, &GridConfig::default(), Some("5s")).unwrap();
        assert_eq!(ctx.options.timeout, Some(std::time::Duration::from_secs(5)));
    }
}
