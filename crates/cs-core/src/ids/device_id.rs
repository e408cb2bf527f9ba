use super::id_macro::string_id;

string_id! {
    /// Client-generated identifier for this installation, attached to uploads
    /// and to the realtime channel path.
    pub struct DeviceId;
}
