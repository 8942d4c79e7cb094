//! Turns a dispatch result into exactly one HTTP response.

use log::error;
use serde_json::{Map, Value};

use crate::dispatch::RequestContext;
use crate::envelope::{JsonEnvelope, RawEnvelope, RenderEnvelope, ResponseEnvelope, TemplateRenderer};
use crate::server::{HttpResponse, StatusCode};

pub const JSON_CONTENT_TYPE: &str = "application/json; charset=UTF-8";
pub const HTML_CONTENT_TYPE: &str = "text/html; charset=UTF-8";
pub const CORS_HEADER: &str = "Access-Control-Allow-Origin";

/// Query parameter that switches a JSON envelope to template output.
pub const TEMPLATE_PARAM: &str = "tpl";

/// Build the response for `result`.
///
/// A `None` result, or any non-200 status captured on the context during
/// dispatch, short-circuits to a plain-text failure carrying the captured
/// reason (or the bare status code when there is none).
pub fn write_response(
    ctx: &RequestContext,
    result: Option<ResponseEnvelope>,
    renderer: &dyn TemplateRenderer,
) -> HttpResponse {
    let envelope = match result {
        Some(envelope) if ctx.status.is_ok() => envelope,
        _ => return failure_response(ctx),
    };

    match envelope {
        ResponseEnvelope::Json(json) => match ctx.request().get_query_param(TEMPLATE_PARAM) {
            Some(tpl) => write_json_template(ctx.path(), tpl, json, renderer),
            None => write_json(&json),
        },
        ResponseEnvelope::Raw(raw) => write_raw(raw),
        ResponseEnvelope::Render(render) => write_render(render, renderer),
    }
}

fn failure_response(ctx: &RequestContext) -> HttpResponse {
    let status = if ctx.status.is_ok() {
        StatusCode::NOT_FOUND
    } else {
        ctx.status
    };

    if ctx.reason.is_empty() {
        HttpResponse::plain(status, status.to_string())
    } else {
        HttpResponse::plain(status, ctx.reason.clone())
    }
}

fn write_json(json: &JsonEnvelope) -> HttpResponse {
    match json.to_bytes() {
        Ok(body) => HttpResponse::new(StatusCode::OK)
            .with_content_type(JSON_CONTENT_TYPE)
            .with_header(CORS_HEADER, "*")
            .with_body_bytes(body),
        Err(e) => {
            error!("Failed to serialize JSON envelope: {e}");
            HttpResponse::plain(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// The template for a `tpl` request is named after the last two path
/// segments: `/a/b?tpl=c` renders `a_b_c.html`.
pub fn template_name_for(path: &str, tpl: &str) -> String {
    let mut segments = path.rsplit('/');
    let last = segments.next().unwrap_or_default();
    let second_last = segments.next().unwrap_or_default();
    format!("{second_last}_{last}_{tpl}.html")
}

fn write_json_template(path: &str, tpl: &str, json: JsonEnvelope, renderer: &dyn TemplateRenderer) -> HttpResponse {
    let fields = match json.data {
        Value::Object(fields) => fields,
        _ => Map::new(),
    };
    let template_name = template_name_for(path, tpl);
    render_html(&template_name, &fields, renderer)
}

fn write_raw(raw: RawEnvelope) -> HttpResponse {
    if raw.status != StatusCode::OK.as_u16() {
        let status = StatusCode::from_u16(raw.status);
        if raw.data.is_empty() {
            return HttpResponse::plain(status, status.to_string());
        }
        return HttpResponse::new(status)
            .with_content_type("text/plain; charset=UTF-8")
            .with_body_bytes(raw.data);
    }

    let mut response = HttpResponse::new(StatusCode::OK);
    if !raw.content_type.is_empty() {
        response = response
            .with_content_type(raw.content_type)
            .with_header(CORS_HEADER, "*");
    }
    response.with_body_bytes(raw.data)
}

fn write_render(render: RenderEnvelope, renderer: &dyn TemplateRenderer) -> HttpResponse {
    render_html(&render.template_name, &render.fields, renderer)
}

fn render_html(template_name: &str, fields: &Map<String, Value>, renderer: &dyn TemplateRenderer) -> HttpResponse {
    match renderer.render(template_name, fields) {
        Ok(html) => HttpResponse::new(StatusCode::OK)
            .with_content_type(HTML_CONTENT_TYPE)
            .with_body_string(html),
        Err(e) => {
            error!("Failed to render {template_name}: {e}");
            HttpResponse::plain(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}
