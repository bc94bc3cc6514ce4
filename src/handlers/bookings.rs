//! Booking lifecycle handlers

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use super::extract::{ApiJson, ApiPath, ApiQuery};
use crate::booking::{
    Booking, BookingService, CreateBookingRequest, DisputeRequest, ListBookingsQuery,
};
use crate::error::ApiError;
use crate::middleware::AuthenticatedUser;
use crate::models::ApiResponse;

pub async fn create_booking(
    State(service): State<Arc<BookingService>>,
    user: AuthenticatedUser,
    ApiJson(request): ApiJson<CreateBookingRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Booking>>), ApiError> {
    let booking = service.request_booking(user.user_id, request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(booking))))
}

pub async fn list_bookings(
    State(service): State<Arc<BookingService>>,
    user: AuthenticatedUser,
    ApiQuery(query): ApiQuery<ListBookingsQuery>,
) -> Result<Json<ApiResponse<Vec<Booking>>>, ApiError> {
    let bookings = service.list_for_user(user.user_id, query.role).await?;
    Ok(Json(ApiResponse::ok(bookings)))
}

pub async fn get_booking(
    State(service): State<Arc<BookingService>>,
    user: AuthenticatedUser,
    ApiPath(booking_id): ApiPath<i64>,
) -> Result<Json<ApiResponse<Booking>>, ApiError> {
    let booking = service.get(user.user_id, booking_id).await?;
    Ok(Json(ApiResponse::ok(booking)))
}

pub async fn approve_booking(
    State(service): State<Arc<BookingService>>,
    user: AuthenticatedUser,
    ApiPath(booking_id): ApiPath<i64>,
) -> Result<Json<ApiResponse<Booking>>, ApiError> {
    let booking = service.approve(user.user_id, booking_id).await?;
    Ok(Json(ApiResponse::ok(booking)))
}

pub async fn reject_booking(
    State(service): State<Arc<BookingService>>,
    user: AuthenticatedUser,
    ApiPath(booking_id): ApiPath<i64>,
) -> Result<Json<ApiResponse<Booking>>, ApiError> {
    let booking = service.reject(user.user_id, booking_id).await?;
    Ok(Json(ApiResponse::ok(booking)))
}

pub async fn cancel_booking(
    State(service): State<Arc<BookingService>>,
    user: AuthenticatedUser,
    ApiPath(booking_id): ApiPath<i64>,
) -> Result<Json<ApiResponse<Booking>>, ApiError> {
    let booking = service.cancel(user.user_id, booking_id).await?;
    Ok(Json(ApiResponse::ok(booking)))
}

pub async fn dispute_booking(
    State(service): State<Arc<BookingService>>,
    user: AuthenticatedUser,
    ApiPath(booking_id): ApiPath<i64>,
    ApiJson(request): ApiJson<DisputeRequest>,
) -> Result<Json<ApiResponse<Booking>>, ApiError> {
    let booking = service.dispute(user.user_id, booking_id, request).await?;
    Ok(Json(ApiResponse::ok(booking)))
}
