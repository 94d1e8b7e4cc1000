//! The prescription template compiled into the crate.
//!
//! Page one carries the patient block, the prescription and the signature;
//! page two (forced with `break-before`) carries the usage instructions.

/// Two-page pt-BR prescription with usage instructions.
pub fn prescription_template() -> &'static str {
    r##"<!DOCTYPE html>
<html lang="pt-BR">
<head>
    <meta charset="utf-8">
    <title>Receita Médica</title>
</head>
<body>
<div class="p-2 text-sm">
    <div class="flex items-center mb-2">
        <img src="LOGO_URL_PLACEHOLDER" alt="Logo" style="width: 56px; height: 56px" />
        <div class="ml-4">
            <h1 class="text-2xl font-bold text-blue-900">Receita Médica</h1>
            <p class="text-xs text-gray-500">Documento gerado eletronicamente</p>
        </div>
    </div>
    <div class="mb-3" style="height: 2px; background-color: #1a365d"></div>

    <h2 class="text-base font-bold text-blue-900">Dados do Paciente</h2>
    <div class="p-3 mb-3 bg-gray-100">
        <div class="flex mb-1"><span class="font-bold w-24">Nome:</span><span>{{NOME_PACIENTE}}</span></div>
        <div class="flex mb-1"><span class="font-bold w-24">CPF:</span><span>{{CPF_PACIENTE}}</span></div>
        <div class="flex mb-1"><span class="font-bold w-24">Endereço:</span><span>{{ENDERECO_PACIENTE}}</span></div>
        <div class="flex mb-1"><span class="font-bold w-24">Telefone:</span><span>{{TELEFONE_PACIENTE}}</span></div>
        <div class="flex"><span class="font-bold w-24">E-mail:</span><span>{{EMAIL_PACIENTE}}</span></div>
    </div>

    <h2 class="text-base font-bold text-blue-900">Prescrição</h2>
    <div class="p-3 mb-3 border border-gray-300">
        <p class="text-lg font-bold mb-2">{{NOME_MEDICAMENTO}} {{DOSAGEM_MEDICAMENTO}}</p>
        <div class="flex mb-2"><span class="font-bold w-24">Quantidade:</span><span>{{QUANTIDADE_MEDICAMENTO}}</span></div>
        <p class="font-bold mb-1">Posologia:</p>
        <p class="mb-0">{{POSOLOGIA_MEDICAMENTO}}</p>
    </div>

    <p class="text-right">Data: {{DATA_ATUAL}}</p>

    <div class="flex flex-col items-center mt-4">
        <img src="SIGNATURE_URL_PLACEHOLDER" alt="Assinatura" style="width: 160px; height: 44px" />
        <div style="width: 220px; height: 1px; background-color: #374151"></div>
        <p class="text-xs mt-1">Assinatura do Médico</p>
    </div>

    <p class="text-xs text-gray-500 text-center mt-4">© {{ANO_ATUAL}} Perceb. Uso exclusivo do paciente.</p>
</div>

<div class="p-2 text-sm break-before">
    <h1 class="text-2xl font-bold text-blue-900 mb-1">Instruções de Uso</h1>
    <p class="text-lg mb-2">{{NOME_MEDICAMENTO}} {{DOSAGEM_MEDICAMENTO}}</p>
    <div class="mb-3" style="height: 2px; background-color: #1a365d"></div>

    <h3 class="text-base font-bold">Como usar</h3>
    <p>{{COMO_USAR}}</p>

    <h3 class="text-base font-bold">Para que serve</h3>
    <p>{{PARA_QUE_SERVE}}</p>

    <h3 class="text-base font-bold">Efeito desejado</h3>
    <p>{{EFEITO_DESEJADO}}</p>

    <h3 class="text-base font-bold">Quando procurar o médico</h3>
    <p>{{QUANDO_PROCURAR_MEDICO}}</p>

    <div class="p-3 mt-4 bg-yellow-100">
        <p class="text-xs mb-0">Não interrompa o uso de {{NOME_MEDICAMENTO}} {{DOSAGEM_MEDICAMENTO}} sem orientação médica. Mantenha fora do alcance de crianças.</p>
    </div>
</div>
</body>
</html>
"##
}
