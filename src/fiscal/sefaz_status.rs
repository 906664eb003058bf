//! Translation of SEFAZ status codes into outcomes and user-facing messages.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusClass {
    Success,
    Rejection,
    Pending,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SefazStatus {
    pub code: String,
    pub description: String,
    pub class: StatusClass,
    pub user_message: String,
}

impl SefazStatus {
    pub fn is_success(&self) -> bool {
        self.class == StatusClass::Success
    }

    pub fn is_rejection(&self) -> bool {
        self.class == StatusClass::Rejection
    }

    pub fn is_pending(&self) -> bool {
        self.class == StatusClass::Pending
    }
}

struct KnownStatus {
    description: &'static str,
    class: StatusClass,
    user_message: &'static str,
}

const fn known(description: &'static str, class: StatusClass, user_message: &'static str) -> KnownStatus {
    KnownStatus {
        description,
        class,
        user_message,
    }
}

static STATUS_TABLE: Lazy<HashMap<&'static str, KnownStatus>> = Lazy::new(|| {
    use StatusClass::*;
    HashMap::from([
        ("100", known("Autorizado o uso da NF-e", Success, "NF-e autorizada")),
        ("101", known("Cancelamento de NF-e homologado", Success, "NF-e cancelada")),
        ("102", known("Inutilização de número homologado", Success, "Numeração inutilizada")),
        ("135", known("Evento registrado e vinculado a NF-e", Success, "Evento de cancelamento registrado")),
        ("155", known("Cancelamento homologado fora de prazo", Success, "Cancelamento homologado fora do prazo")),
        ("107", known("Serviço em operação", Success, "SEFAZ em operação")),
        ("108", known("Serviço paralisado momentaneamente", Rejection, "SEFAZ temporariamente indisponível, tente mais tarde")),
        ("109", known("Serviço paralisado sem previsão", Rejection, "SEFAZ indisponível sem previsão de retorno")),
        ("103", known("Lote recebido com sucesso", Pending, "Lote recebido, aguardando processamento")),
        ("104", known("Lote processado", Pending, "Lote processado, consulte o resultado")),
        ("105", known("Lote em processamento", Pending, "Lote em processamento na SEFAZ")),
        ("204", known("Duplicidade de NF-e", Rejection, "Esta NF-e já foi autorizada")),
        ("205", known("NF-e está denegada na base de dados da SEFAZ", Rejection, "NF-e denegada, verifique a situação do destinatário")),
        ("206", known("NF-e já está inutilizada na base de dados da SEFAZ", Rejection, "Numeração já inutilizada")),
        ("207", known("CNPJ do emitente inválido", Rejection, "CNPJ do emitente inválido")),
        ("208", known("CNPJ do destinatário inválido", Rejection, "CPF/CNPJ do destinatário inválido")),
        ("209", known("IE do emitente inválida", Rejection, "Inscrição estadual do emitente inválida")),
        ("210", known("IE do destinatário inválida", Rejection, "Inscrição estadual do destinatário inválida")),
        ("213", known("CNPJ-Base do emitente difere do CNPJ-Base do certificado digital", Rejection, "O certificado digital não pertence ao emitente")),
        ("214", known("Tamanho da mensagem excedeu o limite estabelecido", Rejection, "NF-e grande demais, reduza itens ou informações adicionais")),
        ("215", known("Falha no reconhecimento da autoria ou integridade do arquivo digital", Rejection, "Falha na assinatura digital, verifique o certificado")),
        ("216", known("NF-e com data de emissão superior à permitida", Rejection, "Data de emissão no futuro")),
        ("217", known("NF-e com data de emissão muito atrasada", Rejection, "Data de emissão antiga demais")),
        ("218", known("NF-e não consta na base de dados da SEFAZ", Rejection, "NF-e não encontrada na SEFAZ")),
        ("301", known("Uso denegado: irregularidade fiscal do emitente", Rejection, "Emitente com irregularidade fiscal")),
        ("302", known("Uso denegado: irregularidade fiscal do destinatário", Rejection, "Destinatário com irregularidade fiscal")),
        ("303", known("Uso denegado: destinatário não habilitado a operar na UF", Rejection, "Destinatário não habilitado nesta UF")),
        ("401", known("CPF do remetente inválido", Rejection, "CPF do remetente inválido")),
        ("402", known("XML da área de cabeçalho com codificação diferente de UTF-8", Rejection, "Codificação do XML inválida")),
        ("403", known("Grupo de NF-e avulsa de uso exclusivo do Fisco", Rejection, "Campos exclusivos do Fisco preenchidos")),
        ("404", known("Uso de prefixo de namespace não permitido", Rejection, "Formato do XML inválido")),
        ("539", known("CNPJ do emitente não cadastrado", Rejection, "CNPJ do emitente não cadastrado na SEFAZ")),
        ("540", known("CNPJ do destinatário não cadastrado", Rejection, "CNPJ do destinatário não cadastrado")),
        ("656", known("Consumo indevido", Rejection, "Limite de consultas excedido, aguarde alguns minutos")),
        ("999", known("Erro não catalogado", Rejection, "Erro desconhecido - entre em contato com o suporte")),
    ])
});

/// Classifies a gateway status code. Unknown codes are rejections.
pub fn classify(code: &str) -> SefazStatus {
    let code = code.trim();
    match STATUS_TABLE.get(code) {
        Some(status) => SefazStatus {
            code: code.to_string(),
            description: status.description.to_string(),
            class: status.class,
            user_message: status.user_message.to_string(),
        },
        None => SefazStatus {
            code: code.to_string(),
            description: format!("Código desconhecido: {}", code),
            class: StatusClass::Rejection,
            user_message: format!("Erro SEFAZ {} - entre em contato com o suporte", code),
        },
    }
}

/// Audit rendering: `[code] translated message - raw gateway message`.
pub fn format_error(code: &str, raw_message: &str) -> String {
    let status = classify(code);
    format!("[{}] {} - {}", status.code, status.user_message, raw_message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_codes() {
        for code in ["100", "101", "102", "135", "155"] {
            let status = classify(code);
            assert!(status.is_success(), "{} should be success", code);
            assert!(!status.is_rejection());
            assert!(!status.is_pending());
        }
    }

    #[test]
    fn pending_codes() {
        for code in ["103", "104", "105"] {
            assert!(classify(code).is_pending());
        }
    }

    #[test]
    fn known_rejections_carry_translated_message() {
        let status = classify("539");
        assert!(status.is_rejection());
        assert_eq!(status.user_message, "CNPJ do emitente não cadastrado na SEFAZ");
    }

    #[test]
    fn unknown_codes_are_never_success() {
        for code in ["", "1", "000", "106", "abc", "100 ", " 7777"] {
            let status = classify(code);
            if STATUS_TABLE.contains_key(code.trim()) {
                continue;
            }
            assert!(status.is_rejection(), "{:?}", code);
            assert!(!status.is_success());
        }
        assert_eq!(
            classify("7777").user_message,
            "Erro SEFAZ 7777 - entre em contato com o suporte"
        );
    }

    #[test]
    fn classes_are_mutually_exclusive_for_every_known_code() {
        for code in STATUS_TABLE.keys() {
            let status = classify(code);
            let flags = [status.is_success(), status.is_rejection(), status.is_pending()];
            assert_eq!(flags.iter().filter(|f| **f).count(), 1, "{}", code);
        }
    }

    #[test]
    fn format_error_includes_code_translation_and_raw_text() {
        assert_eq!(
            format_error("204", "Rejeicao: Duplicidade de NF-e [nRec:123]"),
            "[204] Esta NF-e já foi autorizada - Rejeicao: Duplicidade de NF-e [nRec:123]"
        );
        assert_eq!(
            format_error("8888", "???"),
            "[8888] Erro SEFAZ 8888 - entre em contato com o suporte - ???"
        );
    }
}
