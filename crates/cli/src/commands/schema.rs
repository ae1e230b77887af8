use anyhow::Result;
use parathread_core::configs::thread::thread_config_schema;

pub fn execute() -> Result<()> {
    let schema = thread_config_schema()
        .map_err(|e| anyhow::anyhow!("Failed to generate schema: {}", e))?;
    println!("{}", schema);
    Ok(())
}
