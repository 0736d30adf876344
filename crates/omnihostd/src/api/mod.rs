//! HTTP surface: one module per resource family, assembled into a single
//! router in [`router`]. OpenAPI documentation lives in [`ApiDoc`] below.

pub mod admin;
pub mod devices;
pub mod etherstubs;
pub mod host;
pub mod network;
pub mod storage;
pub mod system;
pub mod tasks;

use axum::routing::{get, post};
use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/monitoring/host", get(host::get_host))
        .route("/monitoring/host/health", get(host::get_health))
        .route("/monitoring/collect", post(host::trigger_collect))
        .route("/monitoring/network/interfaces", get(network::interfaces))
        .route("/monitoring/network/ipaddresses", get(network::ip_addresses))
        .route("/monitoring/network/routes", get(network::routes))
        .route("/monitoring/network/usage", get(network::usage))
        .route("/monitoring/storage/pools", get(storage::pools))
        .route("/monitoring/storage/datasets", get(storage::datasets))
        .route("/monitoring/storage/disks", get(storage::disks))
        .route("/monitoring/storage/disk-io", get(storage::disk_io))
        .route("/monitoring/storage/pool-io", get(storage::pool_io))
        .route("/monitoring/storage/arc", get(storage::arc))
        .route("/monitoring/system/cpu", get(system::cpu))
        .route("/monitoring/system/memory", get(system::memory))
        .route("/monitoring/system/load", get(system::load))
        .route("/monitoring/devices", get(devices::list))
        .route("/network/etherstubs", get(etherstubs::list))
        .route("/network/etherstubs/{name}", post(etherstubs::create).delete(etherstubs::delete))
        .route("/tasks", get(tasks::list).post(tasks::enqueue))
        .route("/tasks/{id}", get(tasks::get))
        .route("/admin/scheduler/start", post(admin::start))
        .route("/admin/scheduler/stop", post(admin::stop))
        .route("/admin/scheduler/restart", post(admin::restart))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(state)
}

#[derive(OpenApi)]
#[openapi(
    paths(
        host::get_host,
        host::get_health,
        host::trigger_collect,
        network::interfaces,
        network::ip_addresses,
        network::routes,
        network::usage,
        storage::pools,
        storage::datasets,
        storage::disks,
        storage::disk_io,
        storage::pool_io,
        storage::arc,
        system::cpu,
        system::memory,
        system::load,
        devices::list,
        etherstubs::list,
        etherstubs::create,
        etherstubs::delete,
        tasks::enqueue,
        tasks::list,
        tasks::get,
        admin::start,
        admin::stop,
        admin::restart,
        crate::auth::bootstrap,
    ),
    components(schemas(
        omnihost_core::model::HostInfo,
        omnihost_core::model::HostHealth,
        omnihost_core::model::NetworkInterface,
        omnihost_core::model::LinkClass,
        omnihost_core::model::NetworkUsage,
        omnihost_core::model::NameConfidence,
        omnihost_core::model::IpAddress,
        omnihost_core::model::Route,
        omnihost_core::model::ZfsPool,
        omnihost_core::model::ZfsDataset,
        omnihost_core::model::Disk,
        omnihost_core::model::DiskIoStats,
        omnihost_core::model::PoolIoStats,
        omnihost_core::model::ArcStats,
        omnihost_core::model::ScanType,
        omnihost_core::model::CpuStats,
        omnihost_core::model::MemoryStats,
        omnihost_core::model::PciDevice,
        omnihost_core::model::DeviceCategory,
        omnihost_core::model::Task,
        omnihost_core::model::NewTask,
        omnihost_core::model::TaskStatus,
        host::HealthResponse,
        host::CollectRequest,
        host::CollectResponse,
        system::LoadAverage,
        admin::AdminAck,
        crate::auth::BootstrapResponse,
        crate::auth::BootstrapError,
    )),
    info(
        title = "omnihostd API",
        version = "1.0",
        description = "Control-plane API for illumos/OmniOS hypervisor hosts — monitoring collectors, the task queue, and console bridge session lifecycle"
    )
)]
pub struct ApiDoc;
