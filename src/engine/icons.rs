//! Fixed icon table the assistant may reference in its `icons` field.
//!
//! Keys are stable identifiers shared with the front-end; `glyph` names the
//! icon in the front-end's icon set. Unknown keys are dropped at render time.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IconDef {
    pub key: &'static str,
    pub glyph: &'static str,
    pub keywords: &'static [&'static str],
    pub description: &'static str,
}

const fn icon(
    key: &'static str,
    glyph: &'static str,
    keywords: &'static [&'static str],
    description: &'static str,
) -> IconDef {
    IconDef {
        key,
        glyph,
        keywords,
        description,
    }
}

pub const ICONS: &[IconDef] = &[
    // Connectivity
    icon("wifi", "wifi", &["wifi", "internet", "conexión", "red", "señal"], "Ícono de WiFi - las rayitas curvas"),
    icon("wifiOff", "wifi-off", &["wifi apagado", "sin internet", "sin conexión"], "WiFi apagado - rayitas con una línea cruzada"),
    icon("bluetooth", "bluetooth", &["bluetooth", "auriculares", "conectar"], "Ícono de Bluetooth - como una B rara"),
    icon("bluetoothOff", "bluetooth-off", &["bluetooth apagado"], "Bluetooth apagado"),
    // Settings & system
    icon("settings", "settings", &["configuración", "ajustes", "engranaje", "ruedita"], "Ruedita de configuración - el engranaje"),
    icon("power", "power", &["encender", "apagar", "prender", "botón"], "Botón de encendido - el circulito con la rayita"),
    icon("restart", "rotate-ccw", &["reiniciar", "reinicio", "volver a prender"], "Flechita circular para reiniciar"),
    icon("home", "home", &["inicio", "casita", "principal"], "Casita - botón de inicio"),
    icon("menu", "menu", &["menú", "opciones", "rayitas"], "Tres rayitas horizontales - el menú"),
    // Sound & notifications
    icon("volume", "volume-2", &["volumen", "sonido", "parlante"], "Parlante con sonido"),
    icon("mute", "volume-x", &["silencio", "mudo", "sin sonido"], "Parlante tachado - silencio"),
    icon("bell", "bell", &["notificación", "campanita", "aviso"], "Campanita de notificaciones"),
    icon("bellOff", "bell-off", &["no molestar", "campanita tachada"], "Campanita tachada - no molestar"),
    icon("mic", "mic", &["micrófono", "hablar", "grabar"], "Micrófono"),
    icon("micOff", "mic-off", &["micrófono apagado", "silenciar micrófono"], "Micrófono tachado"),
    // Communication
    icon("phone", "phone", &["llamar", "teléfono", "llamada"], "Teléfono para llamar"),
    icon("phoneOff", "phone-off", &["colgar", "cortar"], "Teléfono rojo para colgar"),
    icon("message", "message-circle", &["mensaje", "whatsapp", "chat"], "Globito de mensaje"),
    icon("mail", "mail", &["correo", "mail", "email"], "Sobre de correo electrónico"),
    // Battery
    icon("battery", "battery", &["batería", "pila", "carga"], "Batería"),
    icon("batteryLow", "battery-low", &["batería baja", "poca batería", "sin carga"], "Batería baja - poca carga"),
    icon("batteryCharging", "battery-charging", &["cargando", "enchufado"], "Batería cargando - con el rayito"),
    // Media
    icon("camera", "camera", &["cámara", "foto", "sacar foto"], "Cámara de fotos"),
    icon("image", "image", &["imagen", "galería", "fotos"], "Ícono de imagen/foto"),
    icon("video", "video", &["video", "grabar video", "videollamada"], "Cámara de video"),
    icon("music", "music", &["música", "canción"], "Nota musical"),
    // Security
    icon("lock", "lock", &["candado", "bloqueado", "contraseña"], "Candado cerrado"),
    icon("unlock", "unlock", &["desbloquear", "abierto"], "Candado abierto"),
    icon("eye", "eye", &["ver", "mostrar", "ojito"], "Ojito para ver"),
    icon("eyeOff", "eye-off", &["ocultar", "esconder"], "Ojito tachado - ocultar"),
    // Navigation
    icon("search", "search", &["buscar", "lupa"], "Lupa para buscar"),
    icon("back", "arrow-left", &["atrás", "volver"], "Flecha para volver atrás"),
    icon("forward", "arrow-right", &["adelante", "siguiente"], "Flecha para ir adelante"),
    icon("up", "arrow-up", &["arriba", "subir"], "Flecha hacia arriba"),
    icon("down", "arrow-down", &["abajo", "bajar"], "Flecha hacia abajo"),
    icon("close", "x", &["cerrar", "cruz", "salir"], "Cruz para cerrar"),
    // Actions
    icon("download", "download", &["descargar", "bajar archivo"], "Flecha hacia abajo - descargar"),
    icon("upload", "upload", &["subir archivo", "cargar"], "Flecha hacia arriba - subir"),
    icon("delete", "trash-2", &["borrar", "eliminar", "tacho"], "Tacho de basura - borrar"),
    icon("edit", "pencil", &["editar", "lápiz", "modificar"], "Lápiz para editar"),
    icon("copy", "copy", &["copiar", "duplicar"], "Dos cuadraditos - copiar"),
    icon("share", "share-2", &["compartir", "enviar"], "Flechita para compartir"),
    // Status
    icon("help", "circle-help", &["ayuda", "pregunta"], "Signo de pregunta - ayuda"),
    icon("warning", "triangle-alert", &["advertencia", "cuidado", "peligro"], "Signo de exclamación - advertencia"),
    icon("success", "circle-check", &["listo", "correcto", "tilde"], "Tilde verde - todo bien"),
    icon("error", "circle-x", &["error", "falla", "problema"], "Cruz roja - error"),
    icon("info", "info", &["información", "info"], "Letra i - información"),
    // Places & time
    icon("globe", "globe", &["internet", "navegador", "web", "mundo"], "Mundo/globo - internet"),
    icon("location", "map-pin", &["ubicación", "mapa", "gps"], "Pin de ubicación"),
    icon("clock", "clock", &["hora", "reloj", "alarma"], "Reloj"),
    icon("calendar", "calendar", &["calendario", "fecha", "agenda"], "Calendario"),
    icon("user", "user", &["perfil", "usuario", "cuenta"], "Persona - perfil de usuario"),
    icon("contacts", "users", &["contactos", "agenda de contactos"], "Personas - contactos"),
    // Display
    icon("brightness", "sun", &["brillo", "luz de pantalla"], "Sol - brillo de pantalla"),
    icon("darkMode", "moon", &["modo oscuro", "modo noche"], "Luna - modo oscuro"),
    icon("flash", "zap", &["linterna", "flash"], "Rayito - flash/linterna"),
    // Devices
    icon("phone_device", "smartphone", &["celular", "teléfono", "smartphone", "móvil"], "Celular/smartphone"),
    icon("tablet", "tablet", &["tablet", "ipad", "tableta"], "Tablet"),
    icon("computer", "monitor", &["computadora", "monitor", "pantalla", "pc"], "Monitor de computadora"),
    icon("tv", "tv", &["televisor", "tv", "tele", "pantalla"], "Televisor"),
    icon("printer", "printer", &["impresora", "imprimir"], "Impresora"),
    icon("headphones", "headphones", &["auriculares", "cascos", "audífonos"], "Auriculares"),
    icon("speaker", "speaker", &["parlante", "altavoz", "bocina"], "Parlante/altavoz"),
];

/// Look up an icon by its key.
pub fn lookup(key: &str) -> Option<&'static IconDef> {
    ICONS.iter().find(|def| def.key == key)
}

/// First icon whose keywords overlap the query (either contains the other).
pub fn find_by_keyword(query: &str) -> Option<&'static IconDef> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return None;
    }
    ICONS.iter().find(|def| {
        def.keywords
            .iter()
            .any(|kw| query.contains(kw) || kw.contains(query.as_str()))
    })
}

/// Resolve assistant icon keys for rendering; unknown keys are skipped.
pub fn resolve(keys: &[String]) -> Vec<&'static IconDef> {
    keys.iter().filter_map(|k| lookup(k)).collect()
}

/// Comma-separated key list for the model instructions.
pub fn available_keys() -> String {
    ICONS.iter().map(|d| d.key).collect::<Vec<_>>().join(", ")
}
