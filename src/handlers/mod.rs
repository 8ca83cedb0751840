pub mod admin;
pub mod auth;
pub mod orders;
pub mod payments;
pub mod transfers;

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Storefront Orders API",
        version = "0.1.0",
        description = "Order lifecycle, payment reconciliation and stock ledger."
    ),
    paths(
        orders::create_order,
        orders::get_order,
        payments::initialize_payment,
        payments::payment_callback,
        transfers::submit_transfer,
        admin::list_orders,
        admin::get_order,
        admin::decide_order,
        admin::decide_return,
        admin::decide_exchange,
        admin::ship_order,
        admin::mark_delivered,
        admin::cancel_order,
        admin::decide_transfer,
        admin::stock_ledger,
    ),
    components(schemas(
        orders::CreateOrderRequest,
        orders::CreateOrderLineRequest,
        orders::GuestContactRequest,
        orders::CreateOrderResponse,
        orders::OrderResponse,
        orders::OrderItemResponse,
        orders::TrackingResponse,
        payments::InitializePaymentRequest,
        payments::InitializePaymentResponse,
        crate::application::hosted_gateway::PaymentCallback,
        transfers::TransferSubmission,
        transfers::TransferReceiptResponse,
        transfers::BankDetailsResponse,
        admin::AdminAction,
        admin::OrderDecisionRequest,
        admin::ReturnDecisionRequest,
        admin::ExchangeDecisionRequest,
        admin::ShipmentRequest,
        admin::CancelRequest,
        admin::TransferDecisionRequest,
        admin::TransitionResponse,
        admin::ShortfallResponse,
        admin::AdminOrderResponse,
        admin::ContactResponse,
        admin::ExchangeResponse,
        admin::ListOrdersResponse,
        admin::TransferDecisionResponse,
        admin::StockLedgerResponse,
    )),
    tags(
        (name = "orders", description = "Order intake and customer view"),
        (name = "payments", description = "Hosted card gateway and bank transfers"),
        (name = "admin", description = "Back-office order and transfer actions"),
    )
)]
pub struct ApiDoc;
