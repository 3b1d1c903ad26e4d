//! HTTP handlers and request/response shapes.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use domain::service::{ConfigurationService, LinkedEntities};
use domain::{
    AdapterEntity, AdapterPatch, AdapterType, ConfigFamily, ConfigMap, CoreError,
    EnergyOptimizationUnit, EntityId, EntityKind, ExternalServiceConfig, ForecastProviderConfig,
    NotificationConfig,
};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, error};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ConfigurationService>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route(
            "/api/external-services",
            get(list_external_services).post(create_external_service),
        )
        .route(
            "/api/external-services/types",
            get(adapter_types::<ExternalServiceConfig>),
        )
        .route(
            "/api/external-services/:id",
            get(get_external_service)
                .put(update_external_service)
                .delete(delete_external_service),
        )
        .route(
            "/api/external-services/:id/linked",
            get(linked_to_external_service),
        )
        .route(
            "/api/external-services/:id/unlink",
            post(unlink_external_service),
        )
        .route(
            "/api/forecast-providers",
            get(list_forecast_providers).post(create_forecast_provider),
        )
        .route(
            "/api/forecast-providers/types",
            get(adapter_types::<ForecastProviderConfig>),
        )
        .route(
            "/api/forecast-providers/:id",
            get(get_forecast_provider)
                .put(update_forecast_provider)
                .delete(delete_forecast_provider),
        )
        .route("/api/notifiers", get(list_notifiers).post(create_notifier))
        .route(
            "/api/notifiers/types",
            get(adapter_types::<NotificationConfig>),
        )
        .route(
            "/api/notifiers/:id",
            get(get_notifier)
                .put(update_notifier)
                .delete(delete_notifier),
        )
        .route(
            "/api/optimization-units",
            get(list_optimization_units).post(create_optimization_unit),
        )
        .route(
            "/api/optimization-units/:id",
            get(get_optimization_unit).delete(delete_optimization_unit),
        )
        .route(
            "/api/optimization-units/:id/enable",
            post(enable_optimization_unit),
        )
        .route(
            "/api/optimization-units/:id/disable",
            post(disable_optimization_unit),
        )
        .route(
            "/api/optimization-units/:id/notifiers/:notifier_id",
            put(add_unit_notifier).delete(remove_unit_notifier),
        )
        .route("/api/settings", get(get_settings).put(update_settings))
        .with_state(state)
}

// ============================================================================
// Errors
// ============================================================================

/// Error response: a status code plus the shared JSON error body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: serde_json::Value,
}

impl ApiError {
    fn invalid_id(kind: EntityKind, raw: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: http_common::json_error_with_message(
                "invalid_id",
                &format!("'{raw}' is not a valid {kind} id"),
            ),
        }
    }

    fn not_found(kind: EntityKind, id: EntityId) -> Self {
        CoreError::not_found(kind, id).into()
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let status = StatusCode::from_u16(http_common::status_for(&err))
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!(err = %err, "request failed");
        } else {
            debug!(err = %err, "request rejected");
        }
        Self {
            status,
            body: http_common::error_body(&err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

fn parse_id(kind: EntityKind, raw: &str) -> ApiResult<EntityId> {
    raw.parse().map_err(|_| ApiError::invalid_id(kind, raw))
}

fn parse_optional_id(kind: EntityKind, raw: Option<String>) -> ApiResult<Option<EntityId>> {
    raw.filter(|s| !s.trim().is_empty())
        .map(|s| parse_id(kind, &s))
        .transpose()
}

// ============================================================================
// Request / response shapes
// ============================================================================

/// Distinguish an absent field (`None`) from an explicit `null` (`Some(None)`).
fn double_option<'de, D, T>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

#[derive(Deserialize)]
struct CreateAdapterReq {
    name: String,
    adapter_type: String,
    #[serde(default)]
    config: Option<ConfigMap>,
    #[serde(default)]
    external_service_id: Option<String>,
}

#[derive(Deserialize)]
struct UpdateAdapterReq {
    #[serde(default)]
    name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    config: Option<Option<ConfigMap>>,
    #[serde(default, deserialize_with = "double_option")]
    external_service_id: Option<Option<String>>,
}

#[derive(Serialize)]
struct AdapterOut {
    id: String,
    name: String,
    adapter_type: &'static str,
    config: Option<ConfigMap>,
    #[serde(skip_serializing_if = "Option::is_none")]
    external_service_id: Option<String>,
}

#[derive(Serialize)]
struct AdapterTypeOut {
    adapter_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    requires_external_service: Option<&'static str>,
}

#[derive(Serialize)]
struct LinkedOut {
    forecast_providers: Vec<AdapterOut>,
    notifiers: Vec<AdapterOut>,
}

#[derive(Serialize)]
struct UnlinkOut {
    unlinked: usize,
}

#[derive(Deserialize)]
struct CreateUnitReq {
    name: String,
    #[serde(default)]
    description: Option<String>,
}

fn adapter_out<C: ConfigFamily>(entity: &AdapterEntity<C>) -> AdapterOut {
    AdapterOut {
        id: entity.id().to_string(),
        name: entity.name().to_string(),
        adapter_type: entity.adapter_type().as_str(),
        config: entity.config().map(|c| c.to_map()),
        external_service_id: entity.external_service_id().map(|id| id.to_string()),
    }
}

fn adapters_out<C: ConfigFamily>(entities: &[AdapterEntity<C>]) -> Vec<AdapterOut> {
    entities.iter().map(adapter_out).collect()
}

fn linked_out(linked: &LinkedEntities) -> LinkedOut {
    LinkedOut {
        forecast_providers: adapters_out(&linked.forecast_providers),
        notifiers: adapters_out(&linked.notifiers),
    }
}

fn parse_adapter<C: ConfigFamily>(code: &str) -> ApiResult<C::Adapter> {
    C::Adapter::from_code(code.trim()).map_err(|e| e.for_kind(C::KIND).into())
}

fn decode_config<C: ConfigFamily>(
    adapter: C::Adapter,
    raw: Option<ConfigMap>,
) -> ApiResult<Option<C>> {
    raw.map(|map| C::decode(adapter, &map).map_err(|e| ApiError::from(e.for_kind(C::KIND))))
        .transpose()
}

/// Parsed body of a create request.
struct NewAdapter<C: ConfigFamily> {
    name: String,
    adapter: C::Adapter,
    config: Option<C>,
    external_service_id: Option<EntityId>,
}

fn new_adapter<C: ConfigFamily>(req: CreateAdapterReq) -> ApiResult<NewAdapter<C>> {
    let adapter = parse_adapter::<C>(&req.adapter_type)?;
    Ok(NewAdapter {
        name: req.name,
        adapter,
        config: decode_config::<C>(adapter, req.config)?,
        external_service_id: parse_optional_id(
            EntityKind::ExternalService,
            req.external_service_id,
        )?,
    })
}

fn adapter_patch<C: ConfigFamily>(
    adapter: C::Adapter,
    req: UpdateAdapterReq,
) -> ApiResult<AdapterPatch<C>> {
    let mut patch = AdapterPatch::default();
    if let Some(name) = req.name {
        patch = patch.name(name);
    }
    if let Some(config) = req.config {
        patch = patch.config(decode_config::<C>(adapter, config)?);
    }
    if let Some(link) = req.external_service_id {
        patch = patch.external_service(parse_optional_id(EntityKind::ExternalService, link)?);
    }
    Ok(patch)
}

// ============================================================================
// Handlers
// ============================================================================

async fn healthz() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

async fn adapter_types<C: ConfigFamily>() -> impl IntoResponse {
    let registry = C::registry();
    let out: Vec<AdapterTypeOut> = registry
        .adapters()
        .map(|a| AdapterTypeOut {
            adapter_type: a.as_str(),
            requires_external_service: registry.external_service_for(a).map(|s| s.as_str()),
        })
        .collect();
    Json(out)
}

// ---------------- external services ----------------

async fn list_external_services(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<AdapterOut>>> {
    let items = state.service.list_external_services()?;
    Ok(Json(adapters_out(&items)))
}

async fn create_external_service(
    State(state): State<AppState>,
    Json(req): Json<CreateAdapterReq>,
) -> ApiResult<impl IntoResponse> {
    let new = new_adapter::<ExternalServiceConfig>(req)?;
    if new.external_service_id.is_some() {
        return Err(CoreError::configuration(
            EntityKind::ExternalService,
            "external services cannot reference another external service",
        )
        .into());
    }
    let created = state
        .service
        .create_external_service(&new.name, new.adapter, new.config)?;
    Ok((StatusCode::CREATED, Json(adapter_out(&created))))
}

async fn get_external_service(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<AdapterOut>> {
    let id = parse_id(EntityKind::ExternalService, &id)?;
    let found = state
        .service
        .get_external_service(id)?
        .ok_or_else(|| ApiError::not_found(EntityKind::ExternalService, id))?;
    Ok(Json(adapter_out(&found)))
}

async fn update_external_service(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateAdapterReq>,
) -> ApiResult<Json<AdapterOut>> {
    let id = parse_id(EntityKind::ExternalService, &id)?;
    let current = state
        .service
        .get_external_service(id)?
        .ok_or_else(|| ApiError::not_found(EntityKind::ExternalService, id))?;
    let patch = adapter_patch::<ExternalServiceConfig>(current.adapter_type(), req)?;
    let updated = state.service.update_external_service(id, patch)?;
    Ok(Json(adapter_out(&updated)))
}

async fn delete_external_service(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = parse_id(EntityKind::ExternalService, &id)?;
    state.service.remove_external_service(id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn linked_to_external_service(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<LinkedOut>> {
    let id = parse_id(EntityKind::ExternalService, &id)?;
    if state.service.get_external_service(id)?.is_none() {
        return Err(ApiError::not_found(EntityKind::ExternalService, id));
    }
    let linked = state.service.get_entities_by_external_service(id)?;
    Ok(Json(linked_out(&linked)))
}

async fn unlink_external_service(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<UnlinkOut>> {
    let id = parse_id(EntityKind::ExternalService, &id)?;
    let unlinked = state.service.unlink_external_service(id)?;
    Ok(Json(UnlinkOut { unlinked }))
}

// ---------------- forecast providers ----------------

async fn list_forecast_providers(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<AdapterOut>>> {
    let items = state.service.list_forecast_providers()?;
    Ok(Json(adapters_out(&items)))
}

async fn create_forecast_provider(
    State(state): State<AppState>,
    Json(req): Json<CreateAdapterReq>,
) -> ApiResult<impl IntoResponse> {
    let new = new_adapter::<ForecastProviderConfig>(req)?;
    let created = state.service.create_forecast_provider(
        &new.name,
        new.adapter,
        new.config,
        new.external_service_id,
    )?;
    Ok((StatusCode::CREATED, Json(adapter_out(&created))))
}

async fn get_forecast_provider(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<AdapterOut>> {
    let id = parse_id(EntityKind::ForecastProvider, &id)?;
    let found = state
        .service
        .get_forecast_provider(id)?
        .ok_or_else(|| ApiError::not_found(EntityKind::ForecastProvider, id))?;
    Ok(Json(adapter_out(&found)))
}

async fn update_forecast_provider(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateAdapterReq>,
) -> ApiResult<Json<AdapterOut>> {
    let id = parse_id(EntityKind::ForecastProvider, &id)?;
    let current = state
        .service
        .get_forecast_provider(id)?
        .ok_or_else(|| ApiError::not_found(EntityKind::ForecastProvider, id))?;
    let patch = adapter_patch::<ForecastProviderConfig>(current.adapter_type(), req)?;
    let updated = state.service.update_forecast_provider(id, patch)?;
    Ok(Json(adapter_out(&updated)))
}

async fn delete_forecast_provider(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = parse_id(EntityKind::ForecastProvider, &id)?;
    state.service.remove_forecast_provider(id)?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------- notifiers ----------------

async fn list_notifiers(State(state): State<AppState>) -> ApiResult<Json<Vec<AdapterOut>>> {
    let items = state.service.list_notifiers()?;
    Ok(Json(adapters_out(&items)))
}

async fn create_notifier(
    State(state): State<AppState>,
    Json(req): Json<CreateAdapterReq>,
) -> ApiResult<impl IntoResponse> {
    let new = new_adapter::<NotificationConfig>(req)?;
    let created = state.service.create_notifier(
        &new.name,
        new.adapter,
        new.config,
        new.external_service_id,
    )?;
    Ok((StatusCode::CREATED, Json(adapter_out(&created))))
}

async fn get_notifier(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<AdapterOut>> {
    let id = parse_id(EntityKind::Notifier, &id)?;
    let found = state
        .service
        .get_notifier(id)?
        .ok_or_else(|| ApiError::not_found(EntityKind::Notifier, id))?;
    Ok(Json(adapter_out(&found)))
}

async fn update_notifier(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateAdapterReq>,
) -> ApiResult<Json<AdapterOut>> {
    let id = parse_id(EntityKind::Notifier, &id)?;
    let current = state
        .service
        .get_notifier(id)?
        .ok_or_else(|| ApiError::not_found(EntityKind::Notifier, id))?;
    let patch = adapter_patch::<NotificationConfig>(current.adapter_type(), req)?;
    let updated = state.service.update_notifier(id, patch)?;
    Ok(Json(adapter_out(&updated)))
}

async fn delete_notifier(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = parse_id(EntityKind::Notifier, &id)?;
    state.service.remove_notifier(id)?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------- optimization units ----------------

async fn list_optimization_units(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<EnergyOptimizationUnit>>> {
    Ok(Json(state.service.list_optimization_units()?))
}

async fn create_optimization_unit(
    State(state): State<AppState>,
    Json(req): Json<CreateUnitReq>,
) -> ApiResult<impl IntoResponse> {
    let unit = state
        .service
        .create_optimization_unit(&req.name, req.description)?;
    Ok((StatusCode::CREATED, Json(unit)))
}

async fn get_optimization_unit(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<EnergyOptimizationUnit>> {
    let id = parse_id(EntityKind::OptimizationUnit, &id)?;
    let unit = state
        .service
        .get_optimization_unit(id)?
        .ok_or_else(|| ApiError::not_found(EntityKind::OptimizationUnit, id))?;
    Ok(Json(unit))
}

async fn delete_optimization_unit(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = parse_id(EntityKind::OptimizationUnit, &id)?;
    state.service.remove_optimization_unit(id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn enable_optimization_unit(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<EnergyOptimizationUnit>> {
    let id = parse_id(EntityKind::OptimizationUnit, &id)?;
    Ok(Json(state.service.enable_optimization_unit(id)?))
}

async fn disable_optimization_unit(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<EnergyOptimizationUnit>> {
    let id = parse_id(EntityKind::OptimizationUnit, &id)?;
    Ok(Json(state.service.disable_optimization_unit(id)?))
}

async fn add_unit_notifier(
    State(state): State<AppState>,
    Path((id, notifier_id)): Path<(String, String)>,
) -> ApiResult<Json<EnergyOptimizationUnit>> {
    let id = parse_id(EntityKind::OptimizationUnit, &id)?;
    let notifier_id = parse_id(EntityKind::Notifier, &notifier_id)?;
    Ok(Json(
        state
            .service
            .add_notifier_to_optimization_unit(id, notifier_id)?,
    ))
}

async fn remove_unit_notifier(
    State(state): State<AppState>,
    Path((id, notifier_id)): Path<(String, String)>,
) -> ApiResult<Json<EnergyOptimizationUnit>> {
    let id = parse_id(EntityKind::OptimizationUnit, &id)?;
    let notifier_id = parse_id(EntityKind::Notifier, &notifier_id)?;
    Ok(Json(
        state
            .service
            .remove_notifier_from_optimization_unit(id, notifier_id)?,
    ))
}

// ---------------- settings ----------------

async fn get_settings(State(state): State<AppState>) -> ApiResult<Json<ConfigMap>> {
    Ok(Json(state.service.get_all_settings()?))
}

async fn update_settings(
    State(state): State<AppState>,
    Json(changes): Json<ConfigMap>,
) -> ApiResult<Json<ConfigMap>> {
    Ok(Json(state.service.update_settings(changes)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use domain::service::{Repositories, ServiceOptions};
    use serde_json::{json, Value};
    use tower::util::ServiceExt;

    fn app() -> Router {
        let service = ConfigurationService::new(Repositories::in_memory(), ServiceOptions::default());
        router(AppState {
            service: Arc::new(service),
        })
    }

    async fn call(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let req = match body {
            Some(b) => builder
                .header("content-type", "application/json")
                .body(Body::from(b.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn create_ha_service(router: &Router) -> String {
        let (status, body) = call(
            router,
            "POST",
            "/api/external-services",
            Some(json!({
                "name": "home",
                "adapter_type": "home_assistant_api",
                "config": {"url": "http://x", "token": "t"}
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn healthz_ok() {
        let (status, body) = call(&app(), "GET", "/healthz", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn notifier_create_rename_and_fetch() {
        let router = app();
        let (status, created) = call(
            &router,
            "POST",
            "/api/notifiers",
            Some(json!({"name": "desk", "adapter_type": "dummy"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = created["id"].as_str().unwrap();

        let (status, updated) = call(
            &router,
            "PUT",
            &format!("/api/notifiers/{id}"),
            Some(json!({"name": "kitchen"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["name"], "kitchen");
        assert_eq!(updated["adapter_type"], "dummy");

        let (status, list) = call(&router, "GET", "/api/notifiers", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn forecast_provider_links_to_service() {
        let router = app();
        let service_id = create_ha_service(&router).await;

        let (status, provider) = call(
            &router,
            "POST",
            "/api/forecast-providers",
            Some(json!({
                "name": "roof",
                "adapter_type": "home_assistant_api",
                "config": {"entity_forecast_power_actual_h": "sensor.solar_power"},
                "external_service_id": service_id
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(provider["config"]["unit_forecast_power_actual_h"], "W");

        let (status, linked) = call(
            &router,
            "GET",
            &format!("/api/external-services/{service_id}/linked"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(linked["forecast_providers"][0]["id"], provider["id"]);

        let (status, body) = call(
            &router,
            "DELETE",
            &format!("/api/external-services/{service_id}"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "in_use");

        let (status, body) = call(
            &router,
            "POST",
            &format!("/api/external-services/{service_id}/unlink"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["unlinked"], 1);

        let (status, _) = call(
            &router,
            "DELETE",
            &format!("/api/external-services/{service_id}"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn bad_requests_map_to_400() {
        let router = app();
        let (status, body) = call(
            &router,
            "POST",
            "/api/notifiers",
            Some(json!({"name": "x", "adapter_type": "carrier_pigeon"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "configuration");

        let (status, _) = call(
            &router,
            "POST",
            "/api/notifiers",
            Some(json!({"name": "x", "adapter_type": "telegram", "config": {"bot_token": "t"}})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = call(&router, "GET", "/api/notifiers/not-an-id", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "invalid_id");

        let (status, body) = call(
            &router,
            "POST",
            "/api/forecast-providers",
            Some(json!({"name": "  ", "adapter_type": "dummy_solar"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "invalid_name");
    }

    #[tokio::test]
    async fn missing_entities_map_to_404() {
        let router = app();
        let id = EntityId::new();
        for uri in [
            format!("/api/notifiers/{id}"),
            format!("/api/forecast-providers/{id}"),
            format!("/api/external-services/{id}"),
            format!("/api/optimization-units/{id}"),
        ] {
            let (status, body) = call(&router, "GET", &uri, None).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
            assert_eq!(body["error"]["code"], "not_found");
        }
        let (status, _) = call(
            &router,
            "PUT",
            &format!("/api/notifiers/{id}"),
            Some(json!({"name": "n"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn optimization_unit_routes() {
        let router = app();
        let (_, unit) = call(
            &router,
            "POST",
            "/api/optimization-units",
            Some(json!({"name": "garage"})),
        )
        .await;
        let unit_id = unit["id"].as_str().unwrap().to_string();
        assert_eq!(unit["is_enabled"], false);

        let (_, notifier) = call(
            &router,
            "POST",
            "/api/notifiers",
            Some(json!({"name": "desk", "adapter_type": "dummy"})),
        )
        .await;
        let notifier_id = notifier["id"].as_str().unwrap();

        let (status, unit) = call(
            &router,
            "PUT",
            &format!("/api/optimization-units/{unit_id}/notifiers/{notifier_id}"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(unit["notifier_ids"][0], notifier_id);

        let (status, unit) = call(
            &router,
            "POST",
            &format!("/api/optimization-units/{unit_id}/enable"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(unit["is_enabled"], true);

        let (status, unit) = call(
            &router,
            "DELETE",
            &format!("/api/optimization-units/{unit_id}/notifiers/{notifier_id}"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(unit["notifier_ids"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn settings_merge() {
        let router = app();
        let (status, body) = call(
            &router,
            "PUT",
            "/api/settings",
            Some(json!({"timezone": "Europe/Rome"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["timezone"], "Europe/Rome");

        call(&router, "PUT", "/api/settings", Some(json!({"latitude": 41.9}))).await;
        let (_, body) = call(&router, "GET", "/api/settings", None).await;
        assert_eq!(body, json!({"timezone": "Europe/Rome", "latitude": 41.9}));
    }

    #[tokio::test]
    async fn adapter_type_listing() {
        let (status, body) = call(&app(), "GET", "/api/forecast-providers/types", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!([
                {"adapter_type": "dummy_solar"},
                {"adapter_type": "home_assistant_api", "requires_external_service": "home_assistant_api"}
            ])
        );
    }
}
