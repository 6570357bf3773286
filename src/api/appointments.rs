/// Appointment and counseling record endpoints
use crate::{
    appointment::{
        AppointmentDetail, CreateAppointmentRequest, CreateRecordRequest, ListAppointmentsQuery,
        ListAppointmentsResponse, UpdateStatusRequest,
    },
    auth::{self, enforce_roles, AuthContext, Role, RoleGate},
    context::AppContext,
    db::appointment::{Appointment, CounselingRecord},
    error::ApiResult,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    routing::{get, post},
    Json, Router,
};

/// Build appointment routes
pub fn routes(ctx: &AppContext) -> Router<AppContext> {
    let booking = Router::new()
        .route("/api/v1/appointments", post(create_appointment))
        .route_layer(middleware::from_fn_with_state(
            RoleGate::require(&[Role::Student]),
            enforce_roles,
        ));

    let records = Router::new()
        .route("/api/v1/appointments/:id/records", post(create_record))
        .route_layer(middleware::from_fn_with_state(
            RoleGate::require(&[Role::Counselor]),
            enforce_roles,
        ));

    let shared = Router::new()
        .route("/api/v1/appointments", get(list_appointments))
        .route(
            "/api/v1/appointments/:id",
            get(get_appointment).put(update_appointment_status),
        );

    booking
        .merge(records)
        .merge(shared)
        .route_layer(middleware::from_fn_with_state(ctx.clone(), auth::authenticate))
}

async fn create_appointment(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Json(req): Json<CreateAppointmentRequest>,
) -> ApiResult<(StatusCode, Json<Appointment>)> {
    let appointment = ctx.appointment_manager.create(&auth, req).await?;

    Ok((StatusCode::CREATED, Json(appointment)))
}

async fn list_appointments(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Query(query): Query<ListAppointmentsQuery>,
) -> ApiResult<Json<ListAppointmentsResponse>> {
    let appointments = ctx.appointment_manager.list(&auth, query.status).await?;

    Ok(Json(ListAppointmentsResponse { appointments }))
}

async fn get_appointment(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(id): Path<i64>,
) -> ApiResult<Json<AppointmentDetail>> {
    Ok(Json(ctx.appointment_manager.get(&auth, id).await?))
}

async fn update_appointment_status(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(id): Path<i64>,
    Json(req): Json<UpdateStatusRequest>,
) -> ApiResult<Json<Appointment>> {
    let appointment = ctx
        .appointment_manager
        .update_status(&auth, id, req)
        .await?;

    Ok(Json(appointment))
}

async fn create_record(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(id): Path<i64>,
    Json(req): Json<CreateRecordRequest>,
) -> ApiResult<(StatusCode, Json<CounselingRecord>)> {
    let record = ctx.appointment_manager.create_record(&auth, id, req).await?;

    Ok((StatusCode::CREATED, Json(record)))
}
