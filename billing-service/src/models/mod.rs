pub mod customer;
pub mod invoice;
pub mod item;
pub mod notification;
pub mod settings;
pub mod vehicle;
pub mod waybill;

pub use customer::{Customer, CustomerFields};
pub use invoice::{
    CreateInvoiceRequest, Invoice, InvoiceDetail, InvoiceDocument, InvoiceExportRow, InvoiceLine,
    IssuedInvoice, ListInvoicesFilter, decimal_from_value,
};
pub use item::Item;
pub use notification::{Channel, NotificationOutcome, NotificationReport};
pub use settings::{ChannelSettings, CompanyIdentity, ProviderKind, Settings, UpdateSettings};
pub use vehicle::{PlateError, PlateNumber, Vehicle, VehicleFields};
pub use waybill::{DurationUnit, Waybill, WaybillRequest};
