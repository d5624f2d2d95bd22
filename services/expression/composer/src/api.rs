use std::collections::HashMap;
use std::sync::Arc;

use log::info;
use rocket::http::Status;
use rocket::serde::json::{self, json, Json, Value};
use rocket::{Route, State};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use builder::{parse_record, Builder, Expression, NodeView, PathKey, RenderNode};
use telemetry::Measure;

use crate::client::Gateway;
use crate::error::ApiError;
use crate::expression::parse;
use crate::session::SessionStore;

lazy_static! {
    static ref CREATE_MEASURE: Measure = Measure::new("controller", "session_create");
    static ref RENDER_MEASURE: Measure = Measure::new("controller", "session_render");
    static ref NODE_MEASURE: Measure = Measure::new("controller", "session_node");
    static ref EDIT_MEASURE: Measure = Measure::new("controller", "session_edit");
    static ref RECORD_MEASURE: Measure = Measure::new("controller", "session_record");
    static ref SUBMIT_MEASURE: Measure = Measure::new("controller", "session_submit");
    static ref DELETE_MEASURE: Measure = Measure::new("controller", "session_delete");
}

fn session_id(id: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(id).map_err(|_| ApiError::NotFound)
}

#[get("/status")]
fn status() -> Value {
    json!({ "status": "ok" })
}

#[get("/metrics")]
fn metrics() -> Result<String, Status> {
    telemetry::encode().map_err(|_| Status::InternalServerError)
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct CreateRequest {
    expr: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionResponse {
    id: Uuid,
    tree: RenderNode,
}

#[post("/api/v1/sessions", data = "<request>")]
async fn create(
    request: Result<Json<CreateRequest>, json::Error<'_>>,
    sessions: &State<Arc<SessionStore>>,
) -> Result<Json<SessionResponse>, ApiError> {
    CREATE_MEASURE
        .stats(async move {
            // The body is optional, an empty one starts from a blank tree
            let request = match request {
                Ok(request) => request.into_inner(),
                Err(json::Error::Parse(body, _)) if body.trim().is_empty() => {
                    CreateRequest::default()
                }
                Err(e) => return Err(ApiError::InvalidRequest(e.to_string())),
            };

            let builder = match &request.expr {
                Some(text) => Builder::from_expression(&parse(text)?),
                None => Builder::new(),
            };

            let (id, tree) = sessions.create(builder).await?;
            Ok(Json(SessionResponse { id, tree }))
        })
        .await
}

#[get("/api/v1/sessions/<id>")]
async fn render(
    id: &str,
    sessions: &State<Arc<SessionStore>>,
) -> Result<Json<RenderNode>, ApiError> {
    RENDER_MEASURE
        .stats(async move {
            let tree = sessions.render(session_id(id)?).await?;
            Ok(Json(tree))
        })
        .await
}

#[get("/api/v1/sessions/<id>/node?<path>")]
async fn node(
    id: &str,
    path: &str,
    sessions: &State<Arc<SessionStore>>,
) -> Result<Json<NodeView>, ApiError> {
    NODE_MEASURE
        .stats(async move {
            let path: PathKey = path.parse()?;
            let view = sessions.node(session_id(id)?, &path).await?;
            Ok(Json(view))
        })
        .await
}

#[patch("/api/v1/sessions/<id>", format = "json", data = "<record>")]
async fn edit(
    id: &str,
    record: Json<HashMap<String, String>>,
    sessions: &State<Arc<SessionStore>>,
) -> Result<Json<RenderNode>, ApiError> {
    EDIT_MEASURE
        .stats(async move {
            let id = session_id(id)?;
            let record = parse_record(record.into_inner())?;
            let tree = sessions.apply(id, &record).await?;
            Ok(Json(tree))
        })
        .await
}

#[get("/api/v1/sessions/<id>/record")]
async fn record(
    id: &str,
    sessions: &State<Arc<SessionStore>>,
) -> Result<Json<HashMap<String, String>>, ApiError> {
    RECORD_MEASURE
        .stats(async move {
            let record = sessions.record(session_id(id)?).await?;
            Ok(Json(
                record
                    .into_iter()
                    .map(|(key, value)| (key.to_string(), value))
                    .collect(),
            ))
        })
        .await
}

#[derive(Debug, Serialize, Deserialize)]
struct SubmitResult {
    msg: String,
    expression: Expression,
}

#[post("/api/v1/sessions/<id>/submit")]
async fn submit(
    id: &str,
    sessions: &State<Arc<SessionStore>>,
    gateway: &State<Arc<dyn Gateway>>,
) -> Result<Json<SubmitResult>, ApiError> {
    SUBMIT_MEASURE
        .stats(async move {
            let id = session_id(id)?;
            let prepared = sessions.prepare(id).await?;
            let expression = &prepared.expression;
            info!(
                "Submitting session {}: depth {}, variables {:?}",
                id,
                expression.depth(),
                expression.variables()
            );

            // The session lock is not held across the upstream call
            let response = match gateway.submit(expression).await {
                Ok(response) => response,
                Err(e) => {
                    sessions.release(id).await;
                    return Err(ApiError::from(e));
                }
            };
            info!("Session {} submitted: {}", id, response.msg);

            sessions.complete(id, prepared.revision).await;
            Ok(Json(SubmitResult {
                msg: response.msg,
                expression: prepared.expression,
            }))
        })
        .await
}

#[delete("/api/v1/sessions/<id>")]
async fn discard(id: &str, sessions: &State<Arc<SessionStore>>) -> Result<Status, ApiError> {
    DELETE_MEASURE
        .stats(async move {
            sessions.remove(session_id(id)?).await?;
            Ok(Status::NoContent)
        })
        .await
}

pub fn routes() -> Vec<Route> {
    routes![status, metrics, create, render, node, edit, record, submit, discard]
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use rocket::http::ContentType;
    use rocket::local::asynchronous::{Client, LocalResponse};

    use builder::Operator;

    use crate::client::MemoryGateway;
    use crate::config::SessionConfig;

    use super::*;

    async fn setup() -> Result<(Client, Arc<MemoryGateway>), Box<dyn Error>> {
        let gateway = Arc::new(MemoryGateway::new());
        let sessions = Arc::new(SessionStore::new(&SessionConfig {
            max_sessions: 8,
            ..Default::default()
        }));

        let rocket = rocket::build()
            .manage(sessions)
            .manage(gateway.clone() as Arc<dyn Gateway>)
            .mount("/", routes());

        let client = Client::untracked(rocket)
            .await
            .expect("valid rocket instance");

        Ok((client, gateway))
    }

    async fn body(res: LocalResponse<'_>) -> Result<serde_json::Value, Box<dyn Error>> {
        let bytes = res.into_bytes().await.unwrap_or_default();
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn create_session(client: &Client, expr: Option<&str>) -> Result<String, Box<dyn Error>> {
        let request = CreateRequest {
            expr: expr.map(|e| e.to_string()),
        };
        let res = client
            .post("/api/v1/sessions")
            .header(ContentType::JSON)
            .body(serde_json::to_string(&request)?)
            .dispatch()
            .await;
        assert_eq!(res.status(), Status::Ok);

        let decoded: SessionResponse = serde_json::from_value(body(res).await?)?;
        Ok(decoded.id.to_string())
    }

    async fn patch<'c>(
        client: &'c Client,
        id: &str,
        record: serde_json::Value,
    ) -> Result<LocalResponse<'c>, Box<dyn Error>> {
        Ok(client
            .patch(format!("/api/v1/sessions/{}", id))
            .header(ContentType::JSON)
            .body(record.to_string())
            .dispatch()
            .await)
    }

    #[tokio::test]
    async fn test_status() -> Result<(), Box<dyn Error>> {
        let (client, _) = setup().await?;

        let res = client.get("/status").dispatch().await;
        assert_eq!(res.status(), Status::Ok);
        assert_eq!(body(res).await?, json!({ "status": "ok" }));
        Ok(())
    }

    #[tokio::test]
    async fn test_create_without_body() -> Result<(), Box<dyn Error>> {
        let (client, _) = setup().await?;

        let res = client.post("/api/v1/sessions").dispatch().await;
        assert_eq!(res.status(), Status::Ok);
        let created = body(res).await?;
        assert_eq!(created["tree"], json!({ "variant": "Unknown", "path": "root" }));

        let res = client
            .post("/api/v1/sessions")
            .header(ContentType::JSON)
            .body("{}")
            .dispatch()
            .await;
        assert_eq!(res.status(), Status::Ok);

        let res = client
            .post("/api/v1/sessions")
            .header(ContentType::JSON)
            .body("{\"expr\": ")
            .dispatch()
            .await;
        assert_eq!(res.status(), Status::BadRequest);
        Ok(())
    }

    #[tokio::test]
    async fn test_compose_and_submit() -> Result<(), Box<dyn Error>> {
        let (client, gateway) = setup().await?;
        let id = create_session(&client, None).await?;

        let res = patch(
            &client,
            &id,
            json!({
                "root/op": "Add",
                "root": "Expression",
                "root/left": "Number",
                "root/left/number": "10",
                "root/right": "Number",
                "root/right/number": "10",
            }),
        )
        .await?;
        assert_eq!(res.status(), Status::Ok);
        let tree = body(res).await?;
        assert_eq!(tree["variant"], "Expression");
        assert_eq!(tree["left"]["value"], "10");

        let res = client
            .post(format!("/api/v1/sessions/{}/submit", id))
            .dispatch()
            .await;
        assert_eq!(res.status(), Status::Ok);

        let expected = Expression::binary(
            Expression::number(10.0),
            Operator::Add,
            Expression::number(10.0),
        );
        let decoded: SubmitResult = serde_json::from_value(body(res).await?)?;
        assert_eq!(decoded.expression, expected);
        assert_eq!(decoded.msg, "Received (10 + 10)");
        assert_eq!(gateway.submitted().await, vec![expected]);

        // A successful submission discards the session
        let res = client.get(format!("/api/v1/sessions/{}", id)).dispatch().await;
        assert_eq!(res.status(), Status::NotFound);
        Ok(())
    }

    #[tokio::test]
    async fn test_incomplete() -> Result<(), Box<dyn Error>> {
        let (client, gateway) = setup().await?;
        let id = create_session(&client, None).await?;

        patch(
            &client,
            &id,
            json!({
                "root": "Expression",
                "root/op": "Add",
                "root/left": "Number",
                "root/left/number": "10",
            }),
        )
        .await?;

        let res = client
            .post(format!("/api/v1/sessions/{}/submit", id))
            .dispatch()
            .await;
        assert_eq!(res.status(), Status::UnprocessableEntity);
        assert_eq!(
            body(res).await?,
            json!({ "message": "Incomplete node at root/right", "path": "root/right" })
        );

        patch(&client, &id, json!({ "root/right": "Number" })).await?;
        let res = client
            .post(format!("/api/v1/sessions/{}/submit", id))
            .dispatch()
            .await;
        assert_eq!(res.status(), Status::UnprocessableEntity);
        assert_eq!(
            body(res).await?,
            json!({
                "message": "Invalid number at root/right",
                "path": "root/right",
                "field": "number"
            })
        );

        assert!(gateway.submitted().await.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_retry_after_upstream_failure() -> Result<(), Box<dyn Error>> {
        let (client, gateway) = setup().await?;
        let id = create_session(&client, Some("x * (y - 2)")).await?;

        gateway.fail_next(1).await;
        let res = client
            .post(format!("/api/v1/sessions/{}/submit", id))
            .dispatch()
            .await;
        assert_eq!(res.status(), Status::BadGateway);

        // The session survives and can be resubmitted unchanged
        let res = client
            .post(format!("/api/v1/sessions/{}/submit", id))
            .dispatch()
            .await;
        assert_eq!(res.status(), Status::Ok);

        assert_eq!(
            gateway.submitted().await,
            vec![Expression::binary(
                Expression::variable("x"),
                Operator::Mul,
                Expression::binary(
                    Expression::variable("y"),
                    Operator::Sub,
                    Expression::number(2.0)
                ),
            )]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_submit_conflicts() -> Result<(), Box<dyn Error>> {
        let (client, gateway) = setup().await?;
        let id = create_session(&client, Some("a / b")).await?;
        let sessions = client
            .rocket()
            .state::<Arc<SessionStore>>()
            .ok_or("missing session store")?;

        // Another submission of the same session has not returned yet
        let uuid = Uuid::parse_str(&id)?;
        sessions.prepare(uuid).await?;

        let res = client
            .post(format!("/api/v1/sessions/{}/submit", id))
            .dispatch()
            .await;
        assert_eq!(res.status(), Status::Conflict);
        assert!(gateway.submitted().await.is_empty());

        sessions.release(uuid).await;
        let res = client
            .post(format!("/api/v1/sessions/{}/submit", id))
            .dispatch()
            .await;
        assert_eq!(res.status(), Status::Ok);
        assert_eq!(gateway.submitted().await.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_seed_and_node() -> Result<(), Box<dyn Error>> {
        let (client, _) = setup().await?;
        let id = create_session(&client, Some("rate * 3")).await?;

        let res = client
            .get(format!("/api/v1/sessions/{}/node?path=root/left", id))
            .dispatch()
            .await;
        assert_eq!(res.status(), Status::Ok);
        assert_eq!(
            body(res).await?,
            json!({ "variant": "Variable", "name": "rate" })
        );

        let res = client
            .get(format!("/api/v1/sessions/{}/node?path=root", id))
            .dispatch()
            .await;
        assert_eq!(
            body(res).await?,
            json!({
                "variant": "Expression",
                "op": "Mul",
                "left": "root/left",
                "right": "root/right"
            })
        );

        let res = client
            .get(format!("/api/v1/sessions/{}/node?path=root/left/left", id))
            .dispatch()
            .await;
        assert_eq!(body(res).await?, json!({ "variant": "Unknown" }));

        let res = client
            .get(format!("/api/v1/sessions/{}/node?path=expression", id))
            .dispatch()
            .await;
        assert_eq!(res.status(), Status::BadRequest);
        Ok(())
    }

    #[tokio::test]
    async fn test_redeclare_through_api() -> Result<(), Box<dyn Error>> {
        let (client, _) = setup().await?;
        let id = create_session(&client, Some("1 + 2")).await?;

        patch(&client, &id, json!({ "root": "Number", "root/number": "7" })).await?;
        patch(&client, &id, json!({ "root": "Expression" })).await?;

        let res = client
            .get(format!("/api/v1/sessions/{}/record", id))
            .dispatch()
            .await;
        assert_eq!(body(res).await?, json!({ "root": "Expression" }));
        Ok(())
    }

    #[tokio::test]
    async fn test_bad_input() -> Result<(), Box<dyn Error>> {
        let (client, _) = setup().await?;

        let res = client
            .post("/api/v1/sessions")
            .header(ContentType::JSON)
            .body(json!({ "expr": "1 +" }).to_string())
            .dispatch()
            .await;
        assert_eq!(res.status(), Status::BadRequest);

        let id = create_session(&client, None).await?;
        let res = patch(&client, &id, json!({ "root": "BinaryOp" })).await?;
        assert_eq!(res.status(), Status::BadRequest);

        let res = patch(&client, &id, json!({ "root/middle": "Number" })).await?;
        assert_eq!(res.status(), Status::BadRequest);

        let res = client.get("/api/v1/sessions/not-a-session").dispatch().await;
        assert_eq!(res.status(), Status::NotFound);
        Ok(())
    }

    #[tokio::test]
    async fn test_delete() -> Result<(), Box<dyn Error>> {
        let (client, _) = setup().await?;
        let id = create_session(&client, None).await?;

        let res = client
            .delete(format!("/api/v1/sessions/{}", id))
            .dispatch()
            .await;
        assert_eq!(res.status(), Status::NoContent);

        let res = client
            .delete(format!("/api/v1/sessions/{}", id))
            .dispatch()
            .await;
        assert_eq!(res.status(), Status::NotFound);
        Ok(())
    }
}
