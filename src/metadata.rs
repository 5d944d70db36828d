// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

/// Client for the remote metadata catalog (Spotify Web API).
///
/// Acquisition runs once per sync: exchange client credentials for a token,
/// resolve the subject by name, then page through its albums. Each of these
/// calls goes through [`retry_fixed`]. The album search used by the matcher's
/// fallback path is exposed through the [`CoverSearch`] trait as a single
/// attempt; the orchestrator wraps it in its own retry.
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::{
    epoch::{Dated, sort_dated},
    error::Error,
    http::read_json,
    retry::{RetryPolicy, retry_fixed},
};

const DEFAULT_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const DEFAULT_API_BASE: &str = "https://api.spotify.com/v1";

/// Endpoints of the metadata service.
#[derive(Debug, Clone, PartialEq, Eq,)]
pub struct MetadataEndpoints
{
    /// Client-credentials token endpoint.
    pub token_url: String,
    /// Base URL of the web API, without trailing slash.
    pub api_base:  String,
}

impl Default for MetadataEndpoints
{
    fn default() -> Self
    {
        Self {
            token_url: DEFAULT_TOKEN_URL.to_owned(), api_base: DEFAULT_API_BASE.to_owned(),
        }
    }
}

/// Application credentials exchanged for an access token.
#[derive(Clone,)]
pub struct MetadataCredentials
{
    /// Application identifier.
    pub client_id:     String,
    /// Application secret.
    pub client_secret: String,
}

impl std::fmt::Debug for MetadataCredentials
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_,>,) -> std::fmt::Result
    {
        f.debug_struct("MetadataCredentials",)
            .field("client_id", &self.client_id,)
            .field("client_secret", &"<redacted>",)
            .finish()
    }
}

/// Offset pagination parameters for the catalog listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq,)]
pub struct CatalogPaging
{
    /// Items requested per page (the service caps this at 50).
    pub page_size: u32,
    /// Safety bound on the number of pages fetched.
    pub max_pages: u32,
}

impl Default for CatalogPaging
{
    fn default() -> Self
    {
        Self {
            page_size: 50, max_pages: 40,
        }
    }
}

/// Candidate cover image. The service lists the widest image first.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize,)]
pub struct CoverImage
{
    /// Public URL of the image.
    pub url:    String,
    /// Width in pixels, when known.
    #[serde(default)]
    pub width:  Option<u32,>,
    /// Height in pixels, when known.
    #[serde(default)]
    pub height: Option<u32,>,
}

/// Remote catalog record carrying candidate cover images.
#[derive(Debug, Clone, PartialEq, Eq,)]
pub struct CatalogItem
{
    /// Release year taken from the first four characters of the date.
    pub year:   u16,
    /// Title as listed by the service.
    pub name:   String,
    /// Candidate images, best first.
    pub images: Vec<CoverImage,>,
}

impl CatalogItem
{
    /// Returns the conventional best image: the first one listed.
    pub fn best_image(&self,) -> Option<&CoverImage,>
    {
        self.images.first()
    }
}

impl Dated for CatalogItem
{
    fn year(&self,) -> u16
    {
        self.year
    }

    fn name(&self,) -> &str
    {
        &self.name
    }
}

/// Entity whose catalog is synchronized.
#[derive(Debug, Clone, PartialEq, Eq,)]
pub struct Subject
{
    /// Service identifier.
    pub id:   String,
    /// Display name as returned by the service.
    pub name: String,
}

/// Single-item album lookup used when the catalog scan finds no match.
#[async_trait]
pub trait CoverSearch: Send + Sync
{
    /// Searches one album by name for the given subject and returns the best
    /// image of the first hit. The hit's release date is not inspected.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RemoteCall`] when the request fails; retrying is the
    /// caller's concern.
    async fn search_cover(&self, album: &str, subject: &str,) -> Result<Option<CoverImage,>, Error,>;
}

#[derive(Debug, Deserialize,)]
struct TokenResponse
{
    #[serde(default)]
    access_token: Option<String,>,
}

#[derive(Debug, Deserialize,)]
struct Paged<T,>
{
    #[serde(default = "Vec::new")]
    items: Vec<T,>,
}

#[derive(Debug, Deserialize,)]
struct ArtistSearchResponse
{
    artists: Paged<ArtistObject,>,
}

#[derive(Debug, Deserialize,)]
struct AlbumSearchResponse
{
    albums: Paged<AlbumObject,>,
}

#[derive(Debug, Deserialize,)]
struct ArtistObject
{
    id:   String,
    name: String,
}

#[derive(Debug, Deserialize,)]
struct AlbumObject
{
    name:         String,
    #[serde(default)]
    release_date: String,
    #[serde(default)]
    images:       Vec<CoverImage,>,
}

impl AlbumObject
{
    fn into_catalog_item(self,) -> Option<CatalogItem,>
    {
        let year = self
            .release_date
            .get(..4,)
            .filter(|prefix| prefix.bytes().all(|b| b.is_ascii_digit(),),)
            .and_then(|prefix| prefix.parse::<u16,>().ok(),);

        match year {
            Some(year,) => Some(CatalogItem {
                year,
                name: self.name,
                images: self.images,
            },),
            None => {
                warn!("Skipping '{}' with unusable release date {:?}", self.name, self.release_date);
                None
            }
        }
    }
}

fn first_hit_cover(response: AlbumSearchResponse,) -> Option<CoverImage,>
{
    response.albums.items.into_iter().next().and_then(|album| album.images.into_iter().next(),)
}

fn first_subject(response: ArtistSearchResponse, searched: &str,) -> Result<Subject, Error,>
{
    response
        .artists
        .items
        .into_iter()
        .next()
        .map(|artist| Subject {
            id: artist.id, name: artist.name,
        },)
        .ok_or_else(|| Error::SubjectNotFound {
            subject: searched.to_owned(),
        },)
}

/// Collects offset-paginated results until a short page is returned.
///
/// `fetch` receives the offset of each page. Paging stops at the first page
/// holding fewer than `paging.page_size` items, or after `paging.max_pages`
/// pages with a warning.
///
/// # Errors
///
/// Propagates the first error returned by `fetch`.
pub async fn collect_pages<T, F, Fut,>(paging: CatalogPaging, mut fetch: F,) -> Result<Vec<T,>, Error,>
where
    F: FnMut(u32,) -> Fut,
    Fut: std::future::Future<Output = Result<Vec<T,>, Error,>,>,
{
    let page_size = paging.page_size.max(1,);
    let mut collected = Vec::new();

    for page in 0..paging.max_pages {
        let offset = page * page_size;
        let items = fetch(offset,).await?;
        let short = items.len() < page_size as usize;
        debug!("Fetched {} items at offset {}", items.len(), offset);
        collected.extend(items,);

        if short {
            return Ok(collected,);
        }
    }

    warn!("Stopped paging after {} full pages; the listing may be incomplete", paging.max_pages);
    Ok(collected,)
}

/// Authenticated metadata service client.
#[derive(Debug, Clone,)]
pub struct MetadataClient
{
    http:      Client,
    endpoints: MetadataEndpoints,
    token:     String,
    retry:     RetryPolicy,
}

impl MetadataClient
{
    /// Exchanges the credentials for an access token.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AuthFailure`] when the exchange keeps failing or the
    /// response carries no token.
    pub async fn connect(
        http: Client,
        endpoints: MetadataEndpoints,
        credentials: &MetadataCredentials,
        retry: RetryPolicy,
    ) -> Result<Self, Error,>
    {
        info!("Requesting metadata service token");
        let response: TokenResponse = retry_fixed(&retry, "token exchange", || {
            let request = http
                .post(&endpoints.token_url,)
                .basic_auth(&credentials.client_id, Some(&credentials.client_secret,),)
                .form(&[("grant_type", "client_credentials",)],);
            async move { read_json("token exchange", request.send().await,).await }
        },)
        .await
        .map_err(|e| Error::AuthFailure {
            message: e.to_string(),
        },)?;

        let token = response.access_token.filter(|token| !token.is_empty(),).ok_or_else(|| {
            Error::AuthFailure {
                message: "token response did not contain an access token".to_owned(),
            }
        },)?;

        Ok(Self {
            http,
            endpoints,
            token,
            retry,
        },)
    }

    /// Resolves the subject identifier by exact name search.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SubjectNotFound`] for an empty result and
    /// [`Error::RetriesExhausted`] when the search keeps failing.
    pub async fn resolve_subject(&self, name: &str,) -> Result<Subject, Error,>
    {
        info!("Resolving subject '{}'", name);
        let response: ArtistSearchResponse = retry_fixed(&self.retry, "subject search", || {
            self.get_json(
                "subject search",
                "search".to_owned(),
                vec![
                    ("q", name.to_owned(),),
                    ("type", "artist".to_owned(),),
                    ("limit", "1".to_owned(),),
                ],
            )
        },)
        .await?;

        first_subject(response, name,)
    }

    /// Lists every album of the subject, sorted by `(year, name)`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RetriesExhausted`] when a page keeps failing.
    pub async fn list_catalog(
        &self,
        subject: &Subject,
        paging: CatalogPaging,
    ) -> Result<Vec<CatalogItem,>, Error,>
    {
        info!("Listing catalog of '{}'", subject.name);
        let path = format!("artists/{}/albums", subject.id);

        let albums: Vec<AlbumObject,> = collect_pages(paging, |offset| {
            let path = path.clone();
            async move {
                let page: Paged<AlbumObject,> = retry_fixed(&self.retry, "catalog page", || {
                    self.get_json(
                        "catalog page",
                        path.clone(),
                        vec![
                            ("limit", paging.page_size.to_string(),),
                            ("offset", offset.to_string(),),
                        ],
                    )
                },)
                .await?;
                Ok(page.items,)
            }
        },)
        .await?;

        let mut items: Vec<CatalogItem,> =
            albums.into_iter().filter_map(AlbumObject::into_catalog_item,).collect();
        sort_dated(&mut items,);

        info!("Found {} catalog items for '{}'", items.len(), subject.name);
        Ok(items,)
    }

    async fn get_json<T: serde::de::DeserializeOwned,>(
        &self,
        operation: &str,
        path: String,
        query: Vec<(&'static str, String,),>,
    ) -> Result<T, Error,>
    {
        let url = format!("{}/{}", self.endpoints.api_base, path);
        debug!(url = %url, "Querying metadata service");
        let sent = self.http.get(&url,).bearer_auth(&self.token,).query(&query,).send().await;
        read_json(operation, sent,).await
    }
}

#[async_trait]
impl CoverSearch for MetadataClient
{
    async fn search_cover(&self, album: &str, subject: &str,) -> Result<Option<CoverImage,>, Error,>
    {
        let response: AlbumSearchResponse = self
            .get_json(
                "album search",
                "search".to_owned(),
                vec![
                    ("q", album_query(album, subject,),),
                    ("type", "album".to_owned(),),
                    ("limit", "1".to_owned(),),
                ],
            )
            .await?;

        Ok(first_hit_cover(response,),)
    }
}

/// Builds the fallback search query for one album of the subject.
pub fn album_query(album: &str, subject: &str,) -> String
{
    format!("album:{album} artist:{subject}")
}

#[cfg(test)]
mod tests
{
    use std::{cell::RefCell, rc::Rc};

    use super::*;

    const ALBUM_PAGE: &str = r#"{
        "items": [
            {
                "name": "Blood on the Tracks",
                "release_date": "1975-01-20",
                "images": [
                    {"url": "https://i.example/640.jpg", "width": 640, "height": 640},
                    {"url": "https://i.example/64.jpg", "width": 64, "height": 64}
                ]
            },
            {"name": "Desire", "release_date": "1976", "images": []},
            {"name": "Broken", "release_date": "19", "images": []}
        ]
    }"#;

    #[test]
    fn album_page_converts_to_catalog_items()
    {
        let page: Paged<AlbumObject,> = serde_json::from_str(ALBUM_PAGE,).expect("valid page",);
        let items: Vec<CatalogItem,> =
            page.items.into_iter().filter_map(AlbumObject::into_catalog_item,).collect();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].year, 1975);
        assert_eq!(
            items[0].best_image().map(|image| image.url.as_str()),
            Some("https://i.example/640.jpg")
        );
        assert_eq!(items[1].year, 1976);
        assert!(items[1].best_image().is_none());
    }

    #[test]
    fn image_dimensions_may_be_null()
    {
        let image: CoverImage =
            serde_json::from_str(r#"{"url": "https://i.example/a.jpg", "width": null, "height": null}"#,)
                .expect("valid image",);
        assert_eq!(image.width, None);
    }

    #[test]
    fn subject_search_without_items_is_not_found()
    {
        let response: ArtistSearchResponse =
            serde_json::from_str(r#"{"artists": {"items": []}}"#,).expect("valid response",);

        let error = first_subject(response, "Nobody",).expect_err("empty search",);
        assert!(matches!(error, Error::SubjectNotFound { ref subject } if subject == "Nobody"));
    }

    #[test]
    fn subject_search_takes_first_item()
    {
        let response: ArtistSearchResponse = serde_json::from_str(
            r#"{"artists": {"items": [{"id": "74ASZ", "name": "Bob Dylan"}]}}"#,
        )
        .expect("valid response",);

        let subject = first_subject(response, "bob dylan",).expect("subject found",);
        assert_eq!(subject.id, "74ASZ");
        assert_eq!(subject.name, "Bob Dylan");
    }

    #[test]
    fn token_response_may_lack_token()
    {
        let response: TokenResponse =
            serde_json::from_str(r#"{"token_type": "bearer"}"#,).expect("valid response",);
        assert!(response.access_token.is_none());
    }

    #[test]
    fn search_hit_without_release_date_keeps_cover()
    {
        let response: AlbumSearchResponse = serde_json::from_str(
            r#"{"albums": {"items": [{"name": "Desire", "images": [{"url": "https://i.example/d.jpg"}]}]}}"#,
        )
        .expect("valid response",);

        let cover = first_hit_cover(response,).expect("hit carries an image",);
        assert_eq!(cover.url, "https://i.example/d.jpg");
        assert_eq!(cover.width, None);
    }

    #[test]
    fn search_without_hits_or_images_has_no_cover()
    {
        let empty: AlbumSearchResponse =
            serde_json::from_str(r#"{"albums": {"items": []}}"#,).expect("valid response",);
        assert!(first_hit_cover(empty,).is_none());

        let bare: AlbumSearchResponse = serde_json::from_str(
            r#"{"albums": {"items": [{"name": "Desire", "release_date": "1976", "images": []}]}}"#,
        )
        .expect("valid response",);
        assert!(first_hit_cover(bare,).is_none());
    }

    #[test]
    fn album_query_names_album_and_subject()
    {
        assert_eq!(album_query("Desire", "Bob Dylan",), "album:Desire artist:Bob Dylan");
    }

    #[test]
    fn credentials_debug_hides_secret()
    {
        let credentials = MetadataCredentials {
            client_id:     "id".to_owned(),
            client_secret: "hunter2".to_owned(),
        };
        assert!(!format!("{credentials:?}").contains("hunter2"));
    }

    #[tokio::test]
    async fn paging_continues_until_short_page()
    {
        let offsets = Rc::new(RefCell::new(Vec::new(),),);
        let recorded = offsets.clone();
        let paging = CatalogPaging {
            page_size: 2, max_pages: 10,
        };

        let items = collect_pages(paging, move |offset| {
            recorded.borrow_mut().push(offset,);
            let page = if offset < 4 { vec![offset, offset + 1] } else { vec![offset] };
            async move { Ok::<_, Error,>(page,) }
        },)
        .await
        .expect("paging should succeed",);

        assert_eq!(items, vec![0, 1, 2, 3, 4]);
        assert_eq!(*offsets.borrow(), vec![0, 2, 4]);
    }

    #[tokio::test]
    async fn paging_stops_on_empty_page()
    {
        let paging = CatalogPaging {
            page_size: 3, max_pages: 10,
        };

        let items = collect_pages(paging, |offset| async move {
            Ok::<_, Error,>(if offset == 0 { vec![1, 2, 3] } else { Vec::new() },)
        },)
        .await
        .expect("paging should succeed",);

        assert_eq!(items.len(), 3);
    }

    #[tokio::test]
    async fn paging_respects_max_pages()
    {
        let calls = Rc::new(RefCell::new(0u32,),);
        let counter = calls.clone();
        let paging = CatalogPaging {
            page_size: 1, max_pages: 3,
        };

        let items = collect_pages(paging, move |offset| {
            *counter.borrow_mut() += 1;
            async move { Ok::<_, Error,>(vec![offset],) }
        },)
        .await
        .expect("paging should succeed",);

        assert_eq!(items, vec![0, 1, 2]);
        assert_eq!(*calls.borrow(), 3);
    }

    #[tokio::test]
    async fn paging_propagates_errors()
    {
        let result = collect_pages::<u32, _, _,>(CatalogPaging::default(), |_| async {
            Err(Error::remote("catalog page", "boom",),)
        },)
        .await;

        assert!(matches!(result, Err(Error::RemoteCall { .. })));
    }

    #[tokio::test]
    async fn connect_reports_auth_failure_when_unreachable()
    {
        let endpoints = MetadataEndpoints {
            token_url: "http://127.0.0.1:9/api/token".to_owned(),
            api_base:  "http://127.0.0.1:9/v1".to_owned(),
        };
        let credentials = MetadataCredentials {
            client_id:     "id".to_owned(),
            client_secret: "secret".to_owned(),
        };

        let error = MetadataClient::connect(
            Client::new(),
            endpoints,
            &credentials,
            RetryPolicy::new(1, 0,),
        )
        .await
        .expect_err("connection should be refused",);

        assert!(matches!(error, Error::AuthFailure { .. }));
    }
}
