use std::sync::Arc;

use luat_service::LuatService;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<LuatService>,
}
impl AppState {
	/// Opens the configured fragment store and the HTTP providers.
	pub async fn new(config: luat_config::Config) -> color_eyre::Result<Self> {
		let service = LuatService::open(config).await?;

		Ok(Self::from_service(service))
	}

	pub fn from_service(service: LuatService) -> Self {
		Self { service: Arc::new(service) }
	}
}
