//! /host 路由
//!
//! 宿主机清单与负载快照，数据来自 sysinfo。

use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use sysinfo::System;

use super::{html_page, SharedState};

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(index))
        .route("/info", get(info))
        .route("/stats", get(stats))
}

// GET /host
async fn index() -> Response {
    html_page(
        r#"<html><body><h1>Host Information</h1>
<a href="/host/info">info</a><br>
<a href="/host/stats">stats</a><br>
</body></html>"#,
    )
}

// GET /host/info
// 静态清单：系统、内核、CPU、内存总量
async fn info() -> Json<Value> {
    let mut sys = System::new_all();
    sys.refresh_all();

    let cpus: Vec<Value> = sys
        .cpus()
        .iter()
        .map(|c| {
            json!({
                "name": c.name(),
                "brand": c.brand(),
                "frequency_mhz": c.frequency(),
            })
        })
        .collect();

    Json(json!({
        "hostname": System::host_name(),
        "os_name": System::name(),
        "os_version": System::os_version(),
        "kernel_version": System::kernel_version(),
        "arch": System::cpu_arch(),
        "boot_time": System::boot_time(),
        "physical_cores": sys.physical_core_count(),
        "logical_cores": sys.cpus().len(),
        "cpus": cpus,
        "total_memory_bytes": sys.total_memory(),
        "total_swap_bytes": sys.total_swap(),
    }))
}

// GET /host/stats
// 负载快照：CPU 占用需要两次采样之间有最小间隔
async fn stats() -> Json<Value> {
    let mut sys = System::new_all();
    sys.refresh_cpu();
    tokio::time::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL).await;
    sys.refresh_cpu();
    sys.refresh_memory();

    let per_cpu: Vec<f32> = sys.cpus().iter().map(|c| c.cpu_usage()).collect();
    let load = System::load_average();

    Json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_secs": System::uptime(),
        "load_average": {
            "one": load.one,
            "five": load.five,
            "fifteen": load.fifteen,
        },
        "cpu_percent": sys.global_cpu_info().cpu_usage(),
        "cpu_per_percent": per_cpu,
        "mem_total_bytes": sys.total_memory(),
        "mem_used_bytes": sys.used_memory(),
        "mem_available_bytes": sys.available_memory(),
        "swap_total_bytes": sys.total_swap(),
        "swap_used_bytes": sys.used_swap(),
    }))
}
