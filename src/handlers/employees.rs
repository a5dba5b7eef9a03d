use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    database::Database,
    error::{ApiResponse, ApiResult, AppError},
    middleware::{shop_admin, CurrentUser},
    models::{shop::normalize_invite_email, EmployeeDisplay, EmployeeStatus, ShopEmployee, UserRole},
};

#[derive(Debug, Deserialize)]
pub struct InviteInput {
    pub email: String,
    #[serde(default = "default_role")]
    pub role: UserRole,
}

fn default_role() -> UserRole {
    UserRole::Cashier
}

#[derive(Debug, Deserialize)]
pub struct RoleInput {
    pub role: UserRole,
}

pub async fn list_employees(
    user: CurrentUser,
    State(db): State<Database>,
    Path(shop_id): Path<Uuid>,
) -> ApiResult<Vec<EmployeeDisplay>> {
    shop_admin(&db, shop_id, &user).await?;

    let employees = sqlx::query_as::<_, EmployeeDisplay>(
        r#"
        SELECT e.id, e.user_id, e.invited_email, p.full_name, e.role, e.status, e.created_at
        FROM shop_employees e
        LEFT JOIN profiles p ON p.id = e.user_id
        WHERE e.shop_id = $1
        ORDER BY e.created_at
        "#,
    )
    .bind(shop_id)
    .fetch_all(&db)
    .await?;

    Ok(ApiResponse::ok(employees))
}

pub async fn invite_employee(
    user: CurrentUser,
    State(db): State<Database>,
    Path(shop_id): Path<Uuid>,
    Json(input): Json<InviteInput>,
) -> ApiResult<ShopEmployee> {
    shop_admin(&db, shop_id, &user).await?;

    let email = normalize_invite_email(&input.email)
        .ok_or_else(|| AppError::validation("Enter a valid email address"))?;

    let already_invited = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM shop_employees WHERE shop_id = $1 AND invited_email = $2)",
    )
    .bind(shop_id)
    .bind(&email)
    .fetch_one(&db)
    .await?;
    if already_invited {
        return Err(AppError::conflict("This email has already been invited"));
    }

    let owner_email = sqlx::query_scalar::<_, String>(
        "SELECT p.email FROM shops s JOIN profiles p ON p.id = s.owner_id WHERE s.id = $1",
    )
    .bind(shop_id)
    .fetch_one(&db)
    .await?;
    if owner_email.to_lowercase() == email {
        return Err(AppError::validation("The shop owner cannot be invited"));
    }

    let existing_user = sqlx::query_scalar::<_, Uuid>("SELECT id FROM profiles WHERE lower(email) = $1")
        .bind(&email)
        .fetch_optional(&db)
        .await?;
    let status = if existing_user.is_some() {
        EmployeeStatus::Active
    } else {
        EmployeeStatus::Pending
    };

    let employee = sqlx::query_as::<_, ShopEmployee>(
        r#"
        INSERT INTO shop_employees (shop_id, user_id, invited_email, role, status)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(shop_id)
    .bind(existing_user)
    .bind(&email)
    .bind(input.role)
    .bind(status)
    .fetch_one(&db)
    .await
    .map_err(|e| match AppError::from(e) {
        AppError::Conflict(_) => AppError::conflict("This email has already been invited"),
        other => other,
    })?;

    log::info!("shop {} invited {} as {:?}", shop_id, email, input.role);
    Ok(ApiResponse::ok(employee))
}

pub async fn update_employee_role(
    user: CurrentUser,
    State(db): State<Database>,
    Path((shop_id, employee_id)): Path<(Uuid, Uuid)>,
    Json(input): Json<RoleInput>,
) -> ApiResult<ShopEmployee> {
    shop_admin(&db, shop_id, &user).await?;

    let employee = sqlx::query_as::<_, ShopEmployee>(
        "UPDATE shop_employees SET role = $1, updated_at = NOW() WHERE id = $2 AND shop_id = $3 RETURNING *",
    )
    .bind(input.role)
    .bind(employee_id)
    .bind(shop_id)
    .fetch_optional(&db)
    .await?
    .ok_or_else(|| AppError::not_found("Employee"))?;

    Ok(ApiResponse::ok(employee))
}

pub async fn remove_employee(
    user: CurrentUser,
    State(db): State<Database>,
    Path((shop_id, employee_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Uuid> {
    shop_admin(&db, shop_id, &user).await?;

    let removed = sqlx::query("DELETE FROM shop_employees WHERE id = $1 AND shop_id = $2")
        .bind(employee_id)
        .bind(shop_id)
        .execute(&db)
        .await?
        .rows_affected();
    if removed == 0 {
        return Err(AppError::not_found("Employee"));
    }

    log::info!("shop {} removed employee {}", shop_id, employee_id);
    Ok(ApiResponse::ok(employee_id))
}
