use std::borrow::Cow;
use std::future::Future;
use std::net::{AddrParseError, SocketAddr};
use std::sync::Arc;

use percent_encoding::percent_decode_str;
use tracing::{debug, info};
use url::form_urlencoded;
use warp::http::uri::Authority;
use warp::hyper::{Body, Response, StatusCode};
use warp::path::FullPath;
use warp::{Filter, Rejection, Reply};

use super::http_utils::{into_response, odata_reply, ApiError};
use super::odata::{
    collection_response, entity_response, metadata_document, service_document,
    METADATA_SEGMENT,
};
use crate::config::context::SesamOdataContext;
use crate::config::schema::HttpFrontend;
use crate::data_types::PageOptions;
use crate::provider::{next_link, SKIPTOKEN};

/// Root path segment of the service
pub const SERVICE_PATH: &str = "sesam.svc";

const NOT_SUPPORTED: &str = "Not supported yet.";

// Query options we'd have to evaluate ourselves: refuse them rather than
// silently return unfiltered data
const UNSUPPORTED_OPTIONS: [&str; 6] = [
    "$filter", "$orderby", "$expand", "$select", "$search", "$apply",
];

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Invalid bind address: {0}")]
    Address(#[from] AddrParseError),

    #[error("Couldn't start the HTTP server: {0}")]
    Bind(#[from] warp::Error),
}

/// What a path segment under the service root addresses
#[derive(Debug, PartialEq, Eq)]
enum Resource<'a> {
    Metadata,
    Collection(&'a str),
    Entity(&'a str, &'a str),
}

impl<'a> Resource<'a> {
    fn parse(segment: &'a str) -> Self {
        if segment == METADATA_SEGMENT {
            return Resource::Metadata;
        }

        match (segment.find('('), segment.strip_suffix(')')) {
            (Some(open), Some(inner)) => Resource::Entity(&segment[..open], &inner[open + 1..]),
            _ => Resource::Collection(segment),
        }
    }
}

fn parse_u64(name: &str, value: &str) -> Result<u64, ApiError> {
    value
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid value {value:?} for {name}")))
}

fn parse_query(query: &str) -> Result<PageOptions, ApiError> {
    let mut options = PageOptions::default();

    for (name, value) in form_urlencoded::parse(query.as_bytes()) {
        match name.as_ref() {
            name if UNSUPPORTED_OPTIONS.contains(&name) => {
                return Err(ApiError::NotImplemented(format!(
                    "Query option {name} is not supported yet."
                )))
            }
            "$skip" => options.skip = Some(parse_u64("$skip", &value)?),
            "$top" => options.top = Some(parse_u64("$top", &value)?),
            SKIPTOKEN => options.skiptoken = parse_u64(SKIPTOKEN, &value)?,
            _ => debug!("Ignoring query option {name}"),
        }
    }

    Ok(options)
}

// Scheme and authority next-page links are built against
fn base_url(config: &HttpFrontend, host: Option<&Authority>) -> String {
    match (&config.public_url, host) {
        (Some(public_url), _) => public_url.trim_end_matches('/').to_string(),
        (None, Some(host)) => format!("http://{host}"),
        (None, None) => format!("http://{}:{}", config.bind_host, config.bind_port),
    }
}

async fn get_resource(
    context: Arc<SesamOdataContext>,
    segment: String,
    query: String,
    host: Option<Authority>,
    path: FullPath,
) -> Result<Response<Body>, ApiError> {
    let segment: Cow<str> = percent_decode_str(&segment)
        .decode_utf8()
        .map_err(|_| ApiError::BadRequest("Invalid UTF-8 in path".to_string()))?;
    let options = parse_query(&query)?;

    match Resource::parse(&segment) {
        Resource::Metadata => Ok(odata_reply(
            &metadata_document(context.schema.as_ref()),
            StatusCode::OK,
        )),
        Resource::Collection(entity_set) => {
            let page = context
                .collections
                .read_collection(entity_set, options)
                .await?;

            let published_name = context
                .schema
                .entity_set(entity_set)
                .map(|info| info.name)
                .unwrap_or_else(|| entity_set.to_string());

            let link = match page.next_skiptoken {
                Some(skiptoken) => {
                    let mut request_uri =
                        format!("{}{}", base_url(&context.http, host.as_ref()), path.as_str());
                    if !query.is_empty() {
                        request_uri = format!("{request_uri}?{query}");
                    }
                    Some(next_link(&request_uri, skiptoken)?)
                }
                None => None,
            };

            Ok(odata_reply(
                &collection_response(&published_name, &page, link.as_ref()),
                StatusCode::OK,
            ))
        }
        Resource::Entity(entity_set, key_predicate) => {
            let published_name = context
                .schema
                .entity_set(entity_set)
                .map(|info| info.name)
                .ok_or_else(|| {
                    ApiError::NotFound(format!("Entity set {entity_set} not found"))
                })?;

            match context
                .entities
                .read_entity(entity_set, key_predicate)
                .await?
            {
                Some(record) => Ok(odata_reply(
                    &entity_response(&published_name, &record),
                    StatusCode::OK,
                )),
                None => Err(ApiError::NotFound(format!(
                    "No entity {published_name}({key_predicate})"
                ))),
            }
        }
    }
}

// Missing query strings would reject `warp::query::raw`
fn raw_query() -> impl Filter<Extract = (String,), Error = std::convert::Infallible> + Clone {
    warp::query::raw()
        .or(warp::any().map(String::new))
        .unify()
}

// GET /sesam.svc
pub fn service_root(
    context: Arc<SesamOdataContext>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path(SERVICE_PATH)
        .and(warp::path::end())
        .and(warp::get())
        .map(move || odata_reply(&service_document(context.schema.as_ref()), StatusCode::OK))
}

// GET /sesam.svc/[$metadata | EntitySet | EntitySet('key')]
pub fn resource(
    context: Arc<SesamOdataContext>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path(SERVICE_PATH)
        .and(warp::path::param::<String>())
        .and(warp::path::end())
        .and(warp::get())
        .and(raw_query())
        .and(warp::host::optional())
        .and(warp::path::full())
        .then(
            move |segment: String, query: String, host: Option<Authority>, path: FullPath| {
                get_resource(context.clone(), segment, query, host, path)
            },
        )
        .map(into_response)
}

// POST/PUT/PATCH/DELETE /sesam.svc/...
pub fn writes() -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path(SERVICE_PATH)
        .and(
            warp::post()
                .or(warp::put())
                .unify()
                .or(warp::patch())
                .unify()
                .or(warp::delete())
                .unify(),
        )
        .map(|| ApiError::NotImplemented(NOT_SUPPORTED.to_string()))
}

pub fn filters(
    context: Arc<SesamOdataContext>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let cors = warp::cors()
        .allow_any_origin()
        .allow_headers(vec![
            "Accept",
            "Authorization",
            "Content-Type",
            "OData-Version",
            "OData-MaxVersion",
        ])
        .allow_methods(vec!["GET"]);

    service_root(context.clone())
        .or(resource(context))
        .or(writes())
        .with(cors)
        .with(warp::log(module_path!()))
}

/// Serve the service until `shutdown` resolves
pub async fn run_server(
    context: Arc<SesamOdataContext>,
    config: HttpFrontend,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), ServerError> {
    let socket_addr: SocketAddr =
        format!("{}:{}", config.bind_host, config.bind_port).parse()?;
    let filters = filters(context);

    let (addr, server) =
        warp::serve(filters).try_bind_with_graceful_shutdown(socket_addr, shutdown)?;
    info!("Serving OData on http://{addr}/{SERVICE_PATH}");
    server.await;
    info!("HTTP server stopped");
    Ok(())
}
