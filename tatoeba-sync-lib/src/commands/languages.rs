use super::Host;
use super::common::{Common, CommonArgs};
use crate::Result;
use std::io::Write;

pub async fn list_languages<H: Host>(host: &mut H, common: &CommonArgs) -> Result<()> {
    let common = Common::new(common)?;
    let languages = common.orchestrator()?.available_languages().await?;

    let mut out = host.output();
    for code in &languages {
        let _ = writeln!(out, "{code}");
    }

    Ok(())
}
