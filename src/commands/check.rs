//! Check command implementation.
//!
//! Validates configuration, the diagnostic tool and device discovery.

use smartmon_exporter::device::discover;
use smartmon_exporter::tool::DiagnosticTool;

use crate::config::{validate_effective_config, Config};
use crate::startup_checks::{probe_tool, select_tool};

/// Validates configuration, smartctl and discovery. Exits 1 on failure.
pub async fn command_check(devices: bool, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 SMART Metrics Exporter - System Check");
    println!("========================================");

    let mut all_ok = true;

    // Check configuration
    println!("\n⚙️  Checking configuration...");
    match validate_effective_config(config) {
        Ok(_) => println!("   ✅ Configuration is valid"),
        Err(e) => {
            println!("   ❌ Configuration invalid: {}", e);
            all_ok = false;
        }
    }

    // Check the diagnostic tool
    println!("\n🔧 Checking smartctl...");
    let tool = match select_tool(config) {
        Ok(tool) => Some(tool),
        Err(e) => {
            println!("   ❌ {}", e);
            all_ok = false;
            None
        }
    };

    if let Some(tool) = tool {
        match probe_tool(&tool).await {
            Ok(info) => println!("   ✅ smartctl {} (r{})", info.version, info.svn_revision),
            Err(e) => {
                println!("   ❌ {}", e);
                all_ok = false;
            }
        }

        // Check discovery
        println!("\n💽 Discovering devices...");
        let settings = config.collector_settings().unwrap_or_default();
        match discover(&tool, &settings.discovery).await {
            Ok(found) if found.is_empty() => println!("   ⚠️  No devices discovered"),
            Ok(found) => {
                println!("   ✅ {} devices discovered", found.len());
                for device in &found {
                    println!(
                        "   ├─ {} ({}, {})",
                        device.id(),
                        device.interface,
                        device.model.as_deref().unwrap_or("unknown model")
                    );
                    if devices {
                        match tool.read_device(device).await {
                            Ok(record) => println!(
                                "   │  └─ ✅ readable, health: {}",
                                match record.smart_passed {
                                    Some(true) => "PASSED",
                                    Some(false) => "FAILED",
                                    None => "not reported",
                                }
                            ),
                            Err(e) => println!("   │  └─ ❌ {} ({})", e, e.reason()),
                        }
                    }
                }
            }
            Err(e) => {
                println!("   ❌ Discovery failed: {}", e);
                all_ok = false;
            }
        }
    }

    println!("\n📋 Summary:");
    if all_ok {
        println!("   ✅ All checks passed - system is ready");
        Ok(())
    } else {
        println!("   ❌ Some checks failed - please review warnings");
        std::process::exit(1);
    }
}
