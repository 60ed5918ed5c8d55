// src/openapi.rs

use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

use crate::{
    handlers::{admin, live_tests},
    models::{
        leaderboard::{LeaderboardCache, LeaderboardEntry, QuestionStat},
        live_test::LiveTestPaper,
        question::PublicQuestion,
        result::{CategoryScore, EvaluatedResult},
        submission::SubmitAnswersRequest,
    },
    services::evaluation::EvaluationSummary,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        live_tests::get_paper,
        live_tests::submit_answers,
        live_tests::get_leaderboard,
        live_tests::my_result,
        admin::evaluate,
    ),
    components(schemas(
        LiveTestPaper,
        PublicQuestion,
        SubmitAnswersRequest,
        EvaluatedResult,
        CategoryScore,
        LeaderboardCache,
        LeaderboardEntry,
        QuestionStat,
        EvaluationSummary,
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "live-tests", description = "Live test papers, submissions and results"),
        (name = "admin", description = "Evaluation trigger")
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
