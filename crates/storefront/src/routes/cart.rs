//! Cart and checkout route handlers.
//!
//! The cart lives in the session and is rehydrated on every request. Cart
//! mutations answer HTMX requests with fragments and plain form posts with a
//! redirect. The three checkout steps share one page, selected by `?step=`.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{AppendHeaders, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use shopfront_core::{
    Cart, CartItem, CartKey, CheckoutStep, FieldErrors, LoginForm, Money, PaymentForm, ProductId,
    SessionUser, ShippingForm,
};
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{AppError, Result, add_breadcrumb};
use crate::filters;
use crate::flash;
use crate::middleware::{CspNonce, OptionalAuth, RequireAuth, is_htmx};
use crate::models::{clear_checkout, load_cart, load_shipping, save_cart, save_shipping};
use crate::routes::layout::Layout;
use crate::state::AppState;

/// Shown at step 3 when no shipping form has been saved.
pub const SHIPPING_REQUIRED_MESSAGE: &str = "Please fill in the shipping form to continue.";

/// Toast after a valid payment form. Nothing is charged.
pub const PAYMENT_NOT_PROCESSED_MESSAGE: &str =
    "Payment details look good. Payments are not processed in this store.";

// =============================================================================
// Views
// =============================================================================

/// Cart line display data for templates.
#[derive(Clone)]
pub struct CartLineView {
    pub product_id: ProductId,
    pub name: String,
    pub image: String,
    pub quantity: u32,
    pub size: String,
    pub color: String,
    pub price: Money,
    pub line_total: Money,
}

impl From<&CartItem> for CartLineView {
    fn from(item: &CartItem) -> Self {
        Self {
            product_id: item.product.id,
            name: item.product.name.clone(),
            image: item
                .product
                .image_for(&item.selected_color)
                .unwrap_or_default()
                .to_string(),
            quantity: item.quantity,
            size: item.selected_size.clone(),
            color: item.selected_color.clone(),
            price: item.product.price,
            line_total: item.line_total(),
        }
    }
}

/// Cart display data for templates.
#[derive(Clone)]
pub struct CartView {
    pub lines: Vec<CartLineView>,
    pub item_count: u32,
    pub subtotal: Money,
    pub discount: Money,
    pub shipping_fee: Money,
    pub total: Money,
}

impl From<&Cart> for CartView {
    fn from(cart: &Cart) -> Self {
        Self {
            lines: cart.items().iter().map(CartLineView::from).collect(),
            item_count: cart.item_count(),
            subtotal: cart.subtotal(),
            discount: cart.discount(),
            shipping_fee: cart.shipping_fee(),
            total: cart.total(),
        }
    }
}

/// One entry of the step indicator.
#[derive(Clone)]
pub struct StepView {
    pub number: u8,
    pub title: &'static str,
    pub active: bool,
}

fn step_views(current: CheckoutStep) -> Vec<StepView> {
    CheckoutStep::ALL
        .iter()
        .map(|&step| StepView {
            number: step.number(),
            title: step.title(),
            active: step == current,
        })
        .collect()
}

// =============================================================================
// Forms
// =============================================================================

/// `?step=` query parameter.
#[derive(Debug, Deserialize)]
pub struct StepQuery {
    pub step: Option<String>,
}

/// Add to cart form data.
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    pub product_id: ProductId,
    pub size: String,
    pub color: String,
    pub quantity: Option<u32>,
}

/// Remove from cart form data.
#[derive(Debug, Deserialize)]
pub struct RemoveFromCartForm {
    pub product_id: ProductId,
    pub size: String,
    pub color: String,
}

// =============================================================================
// Templates
// =============================================================================

/// Checkout page template.
#[derive(Template, WebTemplate)]
#[template(path = "cart/show.html")]
pub struct CartShowTemplate {
    pub layout: Layout,
    pub step: u8,
    pub steps: Vec<StepView>,
    pub cart: CartView,
    pub shipping: ShippingForm,
    pub shipping_errors: FieldErrors,
    pub has_shipping: bool,
    pub card_holder: String,
    pub expiration_date: String,
    pub payment_errors: FieldErrors,
    pub shipping_required_message: &'static str,
}

impl CartShowTemplate {
    fn new(layout: Layout, step: CheckoutStep, cart: &Cart, shipping: Option<ShippingForm>) -> Self {
        Self {
            layout,
            step: step.number(),
            steps: step_views(step),
            cart: CartView::from(cart),
            has_shipping: shipping.is_some(),
            shipping: shipping.unwrap_or_default(),
            shipping_errors: FieldErrors::new(),
            card_holder: String::new(),
            expiration_date: String::new(),
            payment_errors: FieldErrors::new(),
            shipping_required_message: SHIPPING_REQUIRED_MESSAGE,
        }
    }
}

/// Page shown to visitors who open the checkout without signing in.
#[derive(Template, WebTemplate)]
#[template(path = "cart/auth_required.html")]
pub struct AuthRequiredTemplate {
    pub layout: Layout,
    pub form: LoginForm,
    pub errors: FieldErrors,
    pub next: String,
}

/// Cart lines fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_items.html")]
pub struct CartItemsTemplate {
    pub cart: CartView,
    pub oob: bool,
}

/// Cart count badge fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_count.html")]
pub struct CartCountTemplate {
    pub count: u32,
}

// =============================================================================
// Handlers
// =============================================================================

async fn render_checkout(
    session: &Session,
    nonce: String,
    user: SessionUser,
    step: CheckoutStep,
) -> CartShowTemplate {
    let cart = load_cart(session).await;
    let shipping = load_shipping(session).await;
    let layout = Layout::with_cart(session, nonce, Some(user), &cart).await;
    CartShowTemplate::new(layout, step, &cart, shipping)
}

/// Display the checkout page.
///
/// Visitors who are not signed in get the login form instead.
#[instrument(skip(session, nonce, user))]
pub async fn show(
    session: Session,
    CspNonce(nonce): CspNonce,
    OptionalAuth(user): OptionalAuth,
    Query(query): Query<StepQuery>,
) -> Response {
    let step = CheckoutStep::from_query(query.step.as_deref());

    let Some(user) = user else {
        return AuthRequiredTemplate {
            layout: Layout::load(&session, nonce, None).await,
            form: LoginForm::default(),
            errors: FieldErrors::new(),
            next: step.href(),
        }
        .into_response();
    };

    render_checkout(&session, nonce, user, step)
        .await
        .into_response()
}

/// Add item to cart.
///
/// The price snapshot is taken from the catalog. HTMX requests get the
/// updated count badge and a `cart-updated` trigger.
#[instrument(skip(state, session, headers))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<AddToCartForm>,
) -> Result<Response> {
    let product = state
        .catalog()
        .get(form.product_id)
        .ok_or_else(|| AppError::NotFound(format!("product {}", form.product_id)))?;

    if !product.has_size(&form.size) {
        return Err(AppError::BadRequest(format!("unknown size {:?}", form.size)));
    }
    if !product.has_color(&form.color) {
        return Err(AppError::BadRequest(format!(
            "unknown color {:?}",
            form.color
        )));
    }

    let mut cart = load_cart(&session).await;
    let item = CartItem::new(
        product.clone(),
        form.quantity.unwrap_or(1),
        form.size,
        form.color,
    );
    cart.add(item)
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    save_cart(&session, &cart).await?;

    let product_id = product.id.to_string();
    add_breadcrumb("cart", "Added to cart", Some(&[("product_id", &product_id)]));

    if is_htmx(&headers) {
        return Ok((
            AppendHeaders([("HX-Trigger", "cart-updated")]),
            CartCountTemplate {
                count: cart.item_count(),
            },
        )
            .into_response());
    }

    flash::success(&session, format!("{} added to cart", product.name)).await;
    Ok(Redirect::to(&format!("/products/{}", product.id)).into_response())
}

/// Remove a line from the cart.
#[instrument(skip(session, headers))]
pub async fn remove(
    session: Session,
    headers: HeaderMap,
    Form(form): Form<RemoveFromCartForm>,
) -> Result<Response> {
    let mut cart = load_cart(&session).await;
    let key = CartKey::new(form.product_id, form.size, form.color);
    if cart.remove(&key) {
        save_cart(&session, &cart).await?;
    }

    Ok(cart_changed(&headers, &cart))
}

/// Empty the cart and forget the shipping form.
#[instrument(skip(session, headers))]
pub async fn clear(session: Session, headers: HeaderMap) -> Result<Response> {
    clear_checkout(&session).await?;
    Ok(cart_changed(&headers, &Cart::new()))
}

fn cart_changed(headers: &HeaderMap, cart: &Cart) -> Response {
    if is_htmx(headers) {
        (
            AppendHeaders([("HX-Trigger", "cart-updated")]),
            CartItemsTemplate {
                cart: CartView::from(cart),
                oob: true,
            },
        )
            .into_response()
    } else {
        Redirect::to(&CheckoutStep::Cart.href()).into_response()
    }
}

/// Get cart count badge (HTMX fragment).
#[instrument(skip(session))]
pub async fn count(session: Session) -> impl IntoResponse {
    CartCountTemplate {
        count: load_cart(&session).await.item_count(),
    }
}

/// Step 1 → 2.
#[instrument(skip_all)]
pub async fn proceed(RequireAuth(_user): RequireAuth) -> Redirect {
    Redirect::to(&CheckoutStep::Shipping.href())
}

/// Validate and save the shipping form, then move to payment.
#[instrument(skip(session, nonce, user, form))]
pub async fn shipping(
    session: Session,
    CspNonce(nonce): CspNonce,
    RequireAuth(user): RequireAuth,
    Form(form): Form<ShippingForm>,
) -> Result<Response> {
    if let Err(errors) = form.validate() {
        let mut page = render_checkout(&session, nonce, user, CheckoutStep::Shipping).await;
        page.shipping = form;
        page.shipping_errors = errors;
        return Ok((StatusCode::UNPROCESSABLE_ENTITY, page).into_response());
    }

    save_shipping(&session, &form).await?;
    add_breadcrumb("checkout", "Shipping form saved", None);
    Ok(Redirect::to(&CheckoutStep::Payment.href()).into_response())
}

/// Validate the payment form.
///
/// Card details are never stored or logged, and no payment is processed.
#[instrument(skip(session, nonce, user, form))]
pub async fn payment(
    session: Session,
    CspNonce(nonce): CspNonce,
    RequireAuth(user): RequireAuth,
    Form(form): Form<PaymentForm>,
) -> Response {
    if load_shipping(&session).await.is_none() {
        flash::error(&session, SHIPPING_REQUIRED_MESSAGE).await;
        return Redirect::to(&CheckoutStep::Shipping.href()).into_response();
    }

    if let Err(errors) = form.validate() {
        let mut page = render_checkout(&session, nonce, user, CheckoutStep::Payment).await;
        page.card_holder = form.card_holder;
        page.expiration_date = form.expiration_date;
        page.payment_errors = errors;
        return (StatusCode::UNPROCESSABLE_ENTITY, page).into_response();
    }

    add_breadcrumb("checkout", "Payment form accepted", None);
    flash::info(&session, PAYMENT_NOT_PROCESSED_MESSAGE).await;
    Redirect::to(&CheckoutStep::Payment.href()).into_response()
}
