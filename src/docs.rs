use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::modules::auth::controller::ErrorResponse;
use crate::modules::auth::model::{
    AuthResponse, CheckEmailResponse, EmailDto, LoginDto, MessageResponse, RefreshTokenDto,
    RegisterDto, ResetPasswordDto, TokenPair, VerifyEmailDto,
};
use crate::modules::levels::model::{CreateLevelDto, Level, UpdateLevelDto};
use crate::modules::questions::model::{
    AnswerType, ChoiceDto, ChoiceType, CreateQuestionDto, Question, QuestionChoice, QuestionType,
    QuestionWithChoices, UpdateQuestionDto,
};
use crate::modules::sections::model::{CreateSectionDto, Section, UpdateSectionDto};
use crate::modules::users::model::{PublicUser, UserRole};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::modules::auth::controller::register,
        crate::modules::auth::controller::verify_email,
        crate::modules::auth::controller::resend_otp,
        crate::modules::auth::controller::login,
        crate::modules::auth::controller::refresh,
        crate::modules::auth::controller::forgot_password,
        crate::modules::auth::controller::reset_password,
        crate::modules::auth::controller::check_email,
        crate::modules::auth::controller::delete_account,
        crate::modules::levels::controller::create_level,
        crate::modules::levels::controller::get_levels,
        crate::modules::levels::controller::get_level_by_id,
        crate::modules::levels::controller::update_level,
        crate::modules::levels::controller::delete_level,
        crate::modules::sections::controller::create_section,
        crate::modules::sections::controller::get_sections,
        crate::modules::sections::controller::get_section_by_id,
        crate::modules::sections::controller::update_section,
        crate::modules::sections::controller::delete_section,
        crate::modules::questions::controller::create_question,
        crate::modules::questions::controller::get_questions,
        crate::modules::questions::controller::get_question_by_id,
        crate::modules::questions::controller::get_choices,
        crate::modules::questions::controller::update_question,
        crate::modules::questions::controller::delete_question,
    ),
    components(
        schemas(
            PublicUser,
            UserRole,
            RegisterDto,
            LoginDto,
            VerifyEmailDto,
            EmailDto,
            ResetPasswordDto,
            RefreshTokenDto,
            TokenPair,
            AuthResponse,
            CheckEmailResponse,
            MessageResponse,
            ErrorResponse,
            Level,
            CreateLevelDto,
            UpdateLevelDto,
            Section,
            CreateSectionDto,
            UpdateSectionDto,
            Question,
            QuestionChoice,
            QuestionWithChoices,
            QuestionType,
            AnswerType,
            ChoiceType,
            ChoiceDto,
            CreateQuestionDto,
            UpdateQuestionDto,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Authentication", description = "Registration, verification, and login"),
        (name = "Levels", description = "Top-level learning content"),
        (name = "Sections", description = "Sections within a level"),
        (name = "Questions", description = "Questions, choices, and media")
    ),
    info(
        title = "LinguaZone API",
        version = "0.1.0",
        description = "Content-management backend for a language-learning application, built with Rust, Axum, and PostgreSQL.",
        license(
            name = "MIT"
        )
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            )
        }
    }
}
