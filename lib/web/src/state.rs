use apigraph_engine::Gateway;

#[derive(Clone)]
pub struct AppState {
    pub gateway: Gateway,
}
